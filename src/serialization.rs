// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Length-prefixed byte-string framing used by the canonical proof
//! serialization: each part is a big-endian `u32` length followed by the
//! raw bytes. An empty part frames as four zero bytes, which is what lets
//! absent proof-array entries survive a round trip.

use crate::errors::{Error, Result};

/// Append `part` to `out` with a 4-byte big-endian length prefix.
pub(crate) fn write_length_prefixed(out: &mut Vec<u8>, part: &[u8]) -> Result<()> {
    let len = u32::try_from(part.len()).or(Err(Error::Serialization))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(part);
    Ok(())
}

/// Split one length-prefixed part off the front of `input`, returning the
/// part and the remainder.
pub(crate) fn read_length_prefixed(input: &[u8]) -> Result<(&[u8], &[u8])> {
    if input.len() < 4 {
        return Err(Error::Serialization);
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&input[..4]);
    let len = u32::from_be_bytes(len_bytes) as usize;
    let rest = &input[4..];
    if rest.len() < len {
        return Err(Error::Serialization);
    }
    Ok((&rest[..len], &rest[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_length_prefixed_slices() -> Result<()> {
        let payloads: [&[u8]; 3] = [b"", b"a", b"some longer payload"];
        let mut buf = vec![];
        for p in payloads {
            write_length_prefixed(&mut buf, p)?;
        }
        let mut rest: &[u8] = &buf;
        for p in payloads {
            let (part, remainder) = read_length_prefixed(rest)?;
            assert_eq!(part, p);
            rest = remainder;
        }
        assert!(rest.is_empty());
        Ok(())
    }

    #[test]
    fn read_rejects_truncated_input() -> Result<()> {
        let mut buf = vec![];
        write_length_prefixed(&mut buf, b"payload")?;
        assert!(read_length_prefixed(&buf[..buf.len() - 1]).is_err());
        assert!(read_length_prefixed(&buf[..3]).is_err());
        Ok(())
    }
}
