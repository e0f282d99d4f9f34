/// Classify a buffered file prefix as text or binary.
///
/// A prefix is binary when it contains a NUL byte, or when the bytes with
/// their high bit set do not form valid UTF-8: every lead byte must be
/// `0xC2..=0xF4` followed by the correct number of `0x80..=0xBF`
/// continuation bytes. A multi-byte sequence cut off by the end of the
/// sniff buffer is not evidence of binary content, so a trailing lead byte
/// is excluded from the check.
pub fn is_binary(buf: &[u8]) -> bool {
    if buf.contains(&0) {
        return true;
    }

    let mut end = buf.len();
    if end > 0 && buf[end - 1] & 0xc0 == 0xc0 {
        end -= 1;
    }

    let mut i = 0;
    while i < end {
        let b = buf[i];
        if b < 0x80 {
            i += 1;
            continue;
        }

        // length of the sequence this lead byte starts
        let len = match b {
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            // stray continuation byte or invalid lead (0x80..0xC1, 0xF5..)
            _ => return true,
        };

        for j in 1..len {
            if i + j >= end {
                // sequence truncated at the sniff boundary
                return false;
            }
            if buf[i + j] & 0xc0 != 0x80 {
                return true;
            }
        }

        i += len;
    }

    false
}
