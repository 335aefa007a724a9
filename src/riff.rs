use crate::binary::BinaryReader;
use crate::error::{VetraError, VetraResult};

/// A node in a RIFX chunk tree.
///
/// Every chunk carries a 4-byte tag and its payload; `LIST` chunks (and the
/// `RIFX` root) additionally carry a 4-byte subheader followed by child
/// chunks. Payloads pad to even offsets in the container.
#[derive(Clone, Debug)]
pub struct RiffChunk<'a> {
    pub id: [u8; 4],
    /// List-type tag; zeroed for leaf chunks.
    pub subheader: [u8; 4],
    pub data: &'a [u8],
    pub children: Vec<RiffChunk<'a>>,
}

impl<'a> RiffChunk<'a> {
    /// Big-endian cursor over the payload.
    pub fn reader(&self) -> BinaryReader<'a> {
        BinaryReader::big_endian(self.data)
    }

    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }

    /// Effective tag: the subheader for `LIST` chunks, the id otherwise.
    /// Container payloads are addressed by their list type, not `LIST`.
    pub fn name(&self) -> &[u8; 4] {
        if &self.id == b"LIST" {
            &self.subheader
        } else {
            &self.id
        }
    }

    pub fn is_list(&self) -> bool {
        !self.children.is_empty() || &self.id == b"LIST" || &self.id == b"RIFX"
    }

    /// First direct child with the given name.
    pub fn child(&self, tag: &[u8; 4]) -> Option<&RiffChunk<'a>> {
        self.children.iter().find(|c| c.name() == tag)
    }

    /// All direct children with the given name, in order.
    pub fn find_all<'s>(&'s self, tag: &'s [u8; 4]) -> impl Iterator<Item = &'s RiffChunk<'a>> {
        self.children.iter().filter(move |c| c.name() == tag)
    }

    /// One pass over the direct children, picking the first occurrence of
    /// each requested tag. Absent tags stay `None`.
    pub fn find_multiple<const N: usize>(&self, tags: [&[u8; 4]; N]) -> [Option<&RiffChunk<'a>>; N] {
        let mut out = [None; N];
        for c in &self.children {
            for (slot, tag) in out.iter_mut().zip(tags) {
                if slot.is_none() && c.name() == tag {
                    *slot = Some(c);
                }
            }
        }
        out
    }
}

/// Parses a big-endian RIFX container. Anything that does not start with a
/// `RIFX` root tag is rejected.
pub fn parse_riff(bytes: &[u8]) -> VetraResult<RiffChunk<'_>> {
    let mut r = BinaryReader::big_endian(bytes);
    let id = tag4(r.read(4));
    if &id != b"RIFX" {
        return Err(VetraError::parse("not a RIFX container"));
    }
    let size = r.read_u32() as usize;
    let mut body = r.take(size.min(r.remaining()));
    let subheader = tag4(body.read(4));
    let children = parse_children(&mut body);
    Ok(RiffChunk {
        id,
        subheader,
        data: &[],
        children,
    })
}

fn parse_children<'a>(r: &mut BinaryReader<'a>) -> Vec<RiffChunk<'a>> {
    let mut out = Vec::new();
    while r.remaining() >= 8 {
        let id = tag4(r.read(4));
        let size = r.read_u32() as usize;
        // Declared sizes past the end of the parent are clamped; the format
        // parser layers its own record-size diagnostics on top.
        let mut body = r.take(size.min(r.remaining()));
        if size % 2 == 1 {
            r.skip(1);
        }

        if &id == b"LIST" {
            let subheader = tag4(body.read(4));
            let data = body.read(body.remaining());
            let mut inner = BinaryReader::big_endian(data);
            out.push(RiffChunk {
                id,
                subheader,
                data,
                children: parse_children(&mut inner),
            });
        } else {
            out.push(RiffChunk {
                id,
                subheader: [0; 4],
                data: body.read(body.remaining()),
                children: Vec::new(),
            });
        }
    }
    out
}

fn tag4(src: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    let n = src.len().min(4);
    out[..n].copy_from_slice(&src[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn list(subheader: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = subheader.to_vec();
        for c in children {
            payload.extend_from_slice(c);
        }
        chunk(b"LIST", &payload)
    }

    fn rifx(subheader: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = subheader.to_vec();
        for c in children {
            payload.extend_from_slice(c);
        }
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFX");
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn rejects_non_rifx_root() {
        let bytes = rifx(b"Egg!", &[]);
        let mut wrong = bytes.clone();
        wrong[..4].copy_from_slice(b"RIFF");
        assert!(parse_riff(&bytes).is_ok());
        assert!(parse_riff(&wrong).is_err());
        assert!(parse_riff(b"xx").is_err());
    }

    #[test]
    fn parses_nested_lists_and_padding() {
        let inner = chunk(b"Utf8", b"abc"); // odd payload, padded
        let bytes = rifx(b"Egg!", &[
            list(b"Fold", &[inner]),
            chunk(b"tail", &[1, 2, 3, 4]),
        ]);
        let root = parse_riff(&bytes).unwrap();
        assert_eq!(&root.subheader, b"Egg!");
        assert_eq!(root.children.len(), 2);

        let fold = root.child(b"Fold").unwrap();
        assert_eq!(fold.children.len(), 1);
        assert_eq!(fold.children[0].data, b"abc");
        assert_eq!(root.child(b"tail").unwrap().data, &[1, 2, 3, 4]);
    }

    #[test]
    fn find_multiple_picks_first_occurrences() {
        let bytes = rifx(b"Egg!", &[
            chunk(b"aaaa", b"1"),
            chunk(b"bbbb", b"2"),
            chunk(b"aaaa", b"3"),
        ]);
        let root = parse_riff(&bytes).unwrap();
        let [a, b, missing] = root.find_multiple([b"aaaa", b"bbbb", b"zzzz"]);
        assert_eq!(a.unwrap().data, b"1");
        assert_eq!(b.unwrap().data, b"2");
        assert!(missing.is_none());
    }

    #[test]
    fn find_all_preserves_order() {
        let bytes = rifx(b"Egg!", &[chunk(b"aaaa", b"1"), chunk(b"aaaa", b"3")]);
        let root = parse_riff(&bytes).unwrap();
        let all: Vec<_> = root.find_all(b"aaaa").map(|c| c.data).collect();
        assert_eq!(all, vec![b"1" as &[u8], b"3"]);
    }

    #[test]
    fn truncated_child_is_clamped_not_fatal() {
        let mut bytes = rifx(b"Egg!", &[]);
        // Child claims 100 bytes but only 2 follow.
        bytes.extend_from_slice(b"clip");
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(&[9, 9]);
        let total = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&total.to_be_bytes());

        let root = parse_riff(&bytes).unwrap();
        assert_eq!(root.child(b"clip").unwrap().data, &[9, 9]);
    }
}
