//! End-to-end scenarios over temporary directory trees: indexing, the
//! incremental update protocol, ignore files, archives, and the check and
//! delete modes.

use fgi::index::build::{delete_tree, index_tree};
use fgi::index::reader::{read_dir_index, IndexRecord};
use fgi::index::stats::Stats;
use fgi::index::types::{Config, INDEX_FILENAME, INDEX_MAGIC};
use fgi::utils::fingerprint::{indexhash, Fingerprint};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> Config {
    Config {
        quiet: true,
        no_messages: true,
        ..Config::default()
    }
}

fn run(dir: &Path, config: &Config) -> Stats {
    index_tree(config, dir).expect("index run failed")
}

fn records(dir: &Path) -> Vec<IndexRecord> {
    read_dir_index(dir)
        .expect("index unreadable")
        .expect("index missing")
}

fn index_bytes(dir: &Path) -> Vec<u8> {
    fs::read(dir.join(INDEX_FILENAME)).expect("index missing")
}

/// Let filesystem timestamps advance past the previous index write.
fn tick() {
    sleep(Duration::from_millis(20));
}

fn gz_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Minimal ustar archive with regular-file entries.
fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        let mut header = [0u8; 512];
        header[..name.len()].copy_from_slice(name.as_bytes());
        header[100..108].copy_from_slice(b"0000644\0");
        header[108..116].copy_from_slice(b"0000000\0");
        header[116..124].copy_from_slice(b"0000000\0");
        let size = format!("{:011o}\0", data.len());
        header[124..136].copy_from_slice(size.as_bytes());
        header[136..148].copy_from_slice(b"00000000000\0");
        header[156] = b'0';
        header[257..263].copy_from_slice(b"ustar\0");
        header[263..265].copy_from_slice(b"00");
        header[148..156].copy_from_slice(b"        ");
        let sum: u32 = header.iter().map(|&b| b as u32).sum();
        header[148..156].copy_from_slice(format!("{:06o}\0 ", sum).as_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(data);
        out.extend(std::iter::repeat(0).take((512 - data.len() % 512) % 512));
    }
    out.extend(std::iter::repeat(0).take(1024));
    out
}

/// True when the n-gram's bit is cleared in a written fingerprint.
fn gram_recorded(hashes: &[u8], gram: &[u8]) -> bool {
    let mut h = gram[0] as u16;
    for &b in &gram[1..] {
        h = indexhash(h, b);
    }
    hashes[h as usize % hashes.len()] & (1u8 << (gram.len() - 1)) == 0
}

#[test]
fn empty_tree_gets_magic_only_index() {
    let dir = TempDir::new().unwrap();
    let stats = run(dir.path(), &config());
    assert_eq!(stats.add_dirs, 1);
    assert_eq!(index_bytes(dir.path()), INDEX_MAGIC);

    // a second run leaves the file byte-identical
    let stats = run(dir.path(), &config());
    assert!(stats.is_fresh());
    assert_eq!(index_bytes(dir.path()), INDEX_MAGIC);

    let check = Config {
        check: true,
        ..config()
    };
    assert!(run(dir.path(), &check).is_fresh());
}

#[test]
fn single_ascii_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("hello.txt"), b"hello world\n").unwrap();

    let stats = run(dir.path(), &config());
    assert_eq!(stats.add_files, 1);
    assert_eq!(stats.num_files, 1);

    let records = records(dir.path());
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.basename_str(), "hello.txt");
    assert_eq!(record.header.accuracy, b'5');
    assert!(!record.header.is_binary());
    assert!(!record.header.is_archive());
    assert!(!record.header.is_compressed());
    // a 12-byte text file folds all the way down to the 128-byte floor
    assert_eq!(record.header.logsize(), 7);
    assert_eq!(record.hashes.len(), 128);

    // every 1..8-gram of the content must be recorded
    let data = b"hello world\n";
    for start in 0..data.len() {
        for len in 1..=8.min(data.len() - start) {
            assert!(gram_recorded(&record.hashes, &data[start..start + len]));
        }
    }
}

#[test]
fn index_is_self_accounting() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"alpha content\n").unwrap();
    fs::write(dir.path().join("b.txt"), b"beta content, longer than a\n").unwrap();
    run(dir.path(), &config());

    let bytes = index_bytes(dir.path());
    let total: u64 = records(dir.path())
        .iter()
        .map(|r| r.header.record_len().unwrap())
        .sum();
    assert_eq!(total, bytes.len() as u64 - INDEX_MAGIC.len() as u64);
}

#[test]
fn binary_file_with_and_without_ignore_binary() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bin.dat"), [0u8, 1, 2, 3]).unwrap();

    let skipping = Config {
        ignore_binary: true,
        ..config()
    };
    run(dir.path(), &skipping);
    let skipped = records(dir.path());
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].header.is_binary());
    assert_eq!(skipped[0].header.logsize(), 0);
    assert!(skipped[0].hashes.is_empty());

    let force = Config {
        force: true,
        ..config()
    };
    run(dir.path(), &force);
    let kept = records(dir.path());
    assert_eq!(kept.len(), 1);
    assert!(kept[0].header.is_binary());
    assert!(kept[0].header.logsize() > 0);
    assert!(!kept[0].hashes.is_empty());
}

#[test]
fn zero_byte_file_gets_empty_record() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("empty"), b"").unwrap();
    run(dir.path(), &config());

    let records = records(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].basename_str(), "empty");
    assert_eq!(records[0].header.logsize(), 0);
    assert!(!records[0].header.is_binary());
}

#[test]
fn incremental_delete_drops_record() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("hello.txt"), b"hello world\n").unwrap();
    run(dir.path(), &config());
    assert_eq!(records(dir.path()).len(), 1);

    tick();
    fs::remove_file(dir.path().join("hello.txt")).unwrap();
    let stats = run(dir.path(), &config());
    assert_eq!(stats.del_files, 1);
    assert_eq!(index_bytes(dir.path()), INDEX_MAGIC);
}

#[test]
fn incremental_modify_regenerates_record() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"first version\n").unwrap();
    fs::write(dir.path().join("b.txt"), b"untouched\n").unwrap();
    run(dir.path(), &config());

    tick();
    fs::write(dir.path().join("a.txt"), b"second version, now different\n").unwrap();
    let stats = run(dir.path(), &config());
    assert_eq!(stats.mod_files, 1);
    assert_eq!(stats.add_files, 0);
    assert_eq!(stats.del_files, 0);

    let records = records(dir.path());
    assert_eq!(records.len(), 2);
    let a = records.iter().find(|r| r.basename_str() == "a.txt").unwrap();
    for start in 0..8 {
        assert!(gram_recorded(&a.hashes, &b"second version, now different\n"[start..start + 3]));
    }
}

#[test]
fn unchanged_rerun_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"stable content here\n").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/b.txt"), b"more stable content\n").unwrap();

    run(dir.path(), &config());
    let first_root = index_bytes(dir.path());
    let first_sub = index_bytes(&dir.path().join("sub"));

    tick();
    let stats = run(dir.path(), &config());
    assert!(stats.is_fresh());
    assert_eq!(index_bytes(dir.path()), first_root);
    assert_eq!(index_bytes(&dir.path().join("sub")), first_sub);
}

#[test]
fn force_rebuild_same_record_set() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.txt"), b"one one one\n").unwrap();
    fs::write(dir.path().join("two.txt"), b"two two two\n").unwrap();
    run(dir.path(), &config());

    let mut incremental: Vec<String> = records(dir.path())
        .iter()
        .map(|r| r.basename_str())
        .collect();
    incremental.sort();

    tick();
    let force = Config {
        force: true,
        ..config()
    };
    run(dir.path(), &force);
    let mut forced: Vec<String> = records(dir.path())
        .iter()
        .map(|r| r.basename_str())
        .collect();
    forced.sort();

    assert_eq!(incremental, forced);
}

#[test]
fn ignore_file_excludes_and_reincludes() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".gitignore"), "*.log\n!keep.log\n").unwrap();
    fs::write(dir.path().join("a.log"), b"dropped\n").unwrap();
    fs::write(dir.path().join("keep.log"), b"kept\n").unwrap();
    fs::write(dir.path().join("b.txt"), b"kept too\n").unwrap();

    let with_ignores = Config {
        ignore_files: vec![".gitignore".to_string()],
        ..config()
    };
    let stats = run(dir.path(), &with_ignores);
    assert_eq!(stats.ign_files, 1);

    let mut names: Vec<String> = records(dir.path()).iter().map(|r| r.basename_str()).collect();
    names.sort();
    assert_eq!(names, ["b.txt", "keep.log"]);
}

#[test]
fn nested_ignore_frames_pop_with_traversal() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
    fs::write(dir.path().join("sub/.gitignore"), "*.tmp\n").unwrap();
    fs::write(dir.path().join("sub/x.tmp"), b"excluded\n").unwrap();
    fs::write(dir.path().join("sub/deep/y.txt"), b"included\n").unwrap();
    // outside the frame the glob must not apply
    fs::write(dir.path().join("z.tmp"), b"included\n").unwrap();

    let with_ignores = Config {
        ignore_files: vec![".gitignore".to_string()],
        ..config()
    };
    run(dir.path(), &with_ignores);

    let root_names: Vec<String> = records(dir.path()).iter().map(|r| r.basename_str()).collect();
    assert_eq!(root_names, ["z.tmp"]);
    let sub_names: Vec<String> = records(&dir.path().join("sub"))
        .iter()
        .map(|r| r.basename_str())
        .collect();
    assert!(sub_names.is_empty());
    let deep_names: Vec<String> = records(&dir.path().join("sub/deep"))
        .iter()
        .map(|r| r.basename_str())
        .collect();
    assert_eq!(deep_names, ["y.txt"]);
}

#[test]
fn archive_of_two_members() {
    let dir = TempDir::new().unwrap();
    let tar = tar_bytes(&[("a.txt", b"AAAA"), ("b.txt", b"BBBB")]);
    fs::write(dir.path().join("pack.tar"), &tar).unwrap();

    let decompress = Config {
        decompress: true,
        ..config()
    };
    run(dir.path(), &decompress);

    let records = records(dir.path());
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.basename_str(), "pack.tar");
        assert!(record.header.is_archive());
    }
    assert_ne!(records[0].hashes, records[1].hashes);
}

#[test]
fn archive_records_survive_rerun_and_delete_together() {
    let dir = TempDir::new().unwrap();
    let tar = tar_bytes(&[("a.txt", b"AAAA"), ("b.txt", b"BBBB")]);
    fs::write(dir.path().join("pack.tar"), &tar).unwrap();
    fs::write(dir.path().join("plain.txt"), b"plain\n").unwrap();

    let decompress = Config {
        decompress: true,
        ..config()
    };
    run(dir.path(), &decompress);
    let first = index_bytes(dir.path());
    assert_eq!(records(dir.path()).len(), 3);

    // both archive records are kept across an unchanged rerun
    tick();
    let stats = run(dir.path(), &decompress);
    assert!(stats.is_fresh());
    assert_eq!(index_bytes(dir.path()), first);

    // deleting the archive removes every record that shared its basename
    tick();
    fs::remove_file(dir.path().join("pack.tar")).unwrap();
    let stats = run(dir.path(), &decompress);
    assert_eq!(stats.del_files, 2);
    let names: Vec<String> = records(dir.path()).iter().map(|r| r.basename_str()).collect();
    assert_eq!(names, ["plain.txt"]);
}

#[test]
fn corrupt_archive_falls_back_to_raw_record() {
    let dir = TempDir::new().unwrap();
    // one readable member, then garbage where the next header should be
    let mut tar = tar_bytes(&[("good.txt", b"GOOD")]);
    tar.truncate(1024);
    tar.extend(std::iter::repeat(0xFF).take(512));
    fs::write(dir.path().join("bad.tar"), &tar).unwrap();

    let decompress = Config {
        decompress: true,
        ..config()
    };
    run(dir.path(), &decompress);

    // the readable member is indexed, and the outer file still gets a
    // raw-bytes record once iteration dies on the corrupt header
    let records = records(dir.path());
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.basename_str() == "bad.tar"));
    assert!(records[0].header.is_archive());
    assert!(!records[1].header.is_archive());
    assert!(records[1].header.is_binary());
    assert!(!records[1].hashes.is_empty());

    // both records reconcile as current on an unchanged rerun
    let before = index_bytes(dir.path());
    tick();
    let stats = run(dir.path(), &decompress);
    assert!(stats.is_fresh());
    assert_eq!(index_bytes(dir.path()), before);
}

#[test]
fn path_globs_match_from_indexing_root() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    // the nested ignore file names the path as spelled from the walk root
    fs::write(dir.path().join("sub/.gitignore"), "sub/x.tmp\n").unwrap();
    fs::write(dir.path().join("sub/x.tmp"), b"excluded\n").unwrap();
    fs::write(dir.path().join("sub/y.tmp"), b"included\n").unwrap();

    let with_ignores = Config {
        ignore_files: vec![".gitignore".to_string()],
        ..config()
    };
    run(dir.path(), &with_ignores);

    let names: Vec<String> = records(&dir.path().join("sub"))
        .iter()
        .map(|r| r.basename_str())
        .collect();
    assert_eq!(names, ["y.tmp"]);
}

#[test]
fn gzip_file_compressed_flag_and_content_fingerprint() {
    let dir = TempDir::new().unwrap();
    let content = b"the contents to be found by a later search\n";
    fs::write(dir.path().join("note.gz"), gz_bytes(content)).unwrap();

    let decompress = Config {
        decompress: true,
        ..config()
    };
    run(dir.path(), &decompress);

    let records = records(dir.path());
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.basename_str(), "note.gz");
    assert!(record.header.is_compressed());
    assert!(!record.header.is_archive());

    // the fingerprint is over the decompressed bytes
    let expected = Fingerprint::scan(&mut &content[..], 5, false).unwrap();
    assert_eq!(record.hashes, expected.hashes);
}

#[test]
fn check_mode_reports_drift_without_writing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"checked content\n").unwrap();
    run(dir.path(), &config());
    let before = index_bytes(dir.path());

    tick();
    fs::write(dir.path().join("new.txt"), b"appeared later\n").unwrap();

    let check = Config {
        check: true,
        ..config()
    };
    let stats = run(dir.path(), &check);
    assert!(!stats.is_fresh());
    assert_eq!(stats.add_files, 1);
    // check mode never modifies any file
    assert_eq!(index_bytes(dir.path()), before);

    // an index run afterwards picks the file up, then check is clean
    let stats = run(dir.path(), &config());
    assert_eq!(stats.add_files, 1);
    let stats = run(dir.path(), &check);
    assert!(stats.is_fresh());
}

#[test]
fn check_mode_flags_missing_index() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"not yet indexed\n").unwrap();

    let check = Config {
        check: true,
        ..config()
    };
    let stats = run(dir.path(), &check);
    assert!(!stats.is_fresh());
    assert_eq!(stats.add_dirs, 1);
    assert!(!dir.path().join(INDEX_FILENAME).exists());
}

#[test]
fn delete_mode_removes_only_index_files() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("keep.txt"), b"data\n").unwrap();
    fs::write(dir.path().join("sub/keep2.txt"), b"data\n").unwrap();
    run(dir.path(), &config());
    assert!(dir.path().join(INDEX_FILENAME).exists());
    assert!(dir.path().join("sub").join(INDEX_FILENAME).exists());

    let delete = Config {
        delete: true,
        ..config()
    };
    delete_tree(&delete, dir.path()).unwrap();

    assert!(!dir.path().join(INDEX_FILENAME).exists());
    assert!(!dir.path().join("sub").join(INDEX_FILENAME).exists());
    assert!(dir.path().join("keep.txt").exists());
    assert!(dir.path().join("sub/keep2.txt").exists());
}

#[test]
fn corrupted_index_is_recreated() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"real content\n").unwrap();
    fs::write(dir.path().join(INDEX_FILENAME), b"garbage, not an index").unwrap();

    let stats = run(dir.path(), &config());
    assert_eq!(stats.add_dirs, 1);
    assert_eq!(stats.add_files, 1);

    let records = records(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].basename_str(), "a.txt");
}

#[test]
fn truncated_tail_is_trimmed_on_update() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"some content to index\n").unwrap();
    run(dir.path(), &config());

    // simulate an interrupted writer: garbage after the last record
    let mut bytes = index_bytes(dir.path());
    let valid_len = bytes.len();
    bytes.extend_from_slice(&[b'5', 9, 200, 0]);
    fs::write(dir.path().join(INDEX_FILENAME), &bytes).unwrap();

    tick();
    fs::write(dir.path().join("b.txt"), b"second file\n").unwrap();
    run(dir.path(), &config());

    let records = records(dir.path());
    assert_eq!(records.len(), 2);
    let total: u64 = records.iter().map(|r| r.header.record_len().unwrap()).sum();
    let bytes = index_bytes(dir.path());
    assert_eq!(total, bytes.len() as u64 - 5);
    assert!(bytes.len() > valid_len);
}

#[test]
fn accuracy_digit_is_stamped_into_records() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"accuracy test content\n").unwrap();

    let sharp = Config {
        accuracy: 9,
        ..config()
    };
    run(dir.path(), &sharp);
    assert_eq!(records(dir.path())[0].header.accuracy, b'9');
}

#[test]
fn hidden_files_indexed_only_with_hidden_flag() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".secret"), b"hidden content\n").unwrap();
    fs::write(dir.path().join("visible"), b"plain content\n").unwrap();

    run(dir.path(), &config());
    let names: Vec<String> = records(dir.path()).iter().map(|r| r.basename_str()).collect();
    assert_eq!(names, ["visible"]);

    let hidden = Config {
        hidden: true,
        force: true,
        ..config()
    };
    run(dir.path(), &hidden);
    let mut names: Vec<String> = records(dir.path()).iter().map(|r| r.basename_str()).collect();
    names.sort();
    assert_eq!(names, [".secret", "visible"]);
}
