use quire_types::{Dictionary, ObjectId, Stream, Value};

use crate::error::{WriterError, WriterResult};
use crate::serialize::encode_value;

/// Accumulates small objects for a `/Type /ObjStm` stream.
///
/// Members must be generation 0 and must not be streams themselves. The
/// builder knows the object number it will be written under so callers can
/// record `FlushedToObjectStream` locations as members are pushed.
#[derive(Debug)]
pub struct ObjectStreamBuilder {
    number: u32,
    capacity: usize,
    members: Vec<(u32, usize)>,
    body: Vec<u8>,
}

impl ObjectStreamBuilder {
    pub fn new(number: u32, capacity: usize) -> Self {
        Self {
            number,
            capacity: capacity.max(1),
            members: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Object number of the stream itself.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// Returns `true` if `id` and `value` may live in an object stream.
    pub fn accepts(id: ObjectId, value: &Value) -> bool {
        id.generation() == 0 && !matches!(value, Value::Stream(_))
    }

    /// Append a member and return its index within the stream.
    pub fn push(&mut self, id: ObjectId, value: &Value) -> WriterResult<u32> {
        if self.is_full() {
            return Err(WriterError::ObjectStreamFull {
                capacity: self.capacity,
            });
        }
        if !Self::accepts(id, value) {
            return Err(WriterError::NotCompressible(id));
        }
        let offset = self.body.len();
        encode_value(&mut self.body, value, id)?;
        self.body.push(b'\n');
        self.members.push((id.number(), offset));
        Ok((self.members.len() - 1) as u32)
    }

    /// Object numbers of the members, in index order.
    pub fn member_numbers(&self) -> Vec<u32> {
        self.members.iter().map(|(n, _)| *n).collect()
    }

    /// Assemble the stream: the `number offset` header followed by the
    /// member bodies.
    pub fn finish(self) -> Stream {
        let header = self
            .members
            .iter()
            .map(|(n, off)| format!("{n} {off}"))
            .collect::<Vec<_>>()
            .join(" ")
            + "\n";

        let mut dict = Dictionary::with_type("ObjStm");
        dict.insert("N", self.members.len());
        dict.insert("First", header.len());

        let mut data = header.into_bytes();
        data.extend_from_slice(&self.body);
        Stream::new(dict, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_offsets_point_at_members() {
        let mut b = ObjectStreamBuilder::new(10, 4);
        assert_eq!(b.push(ObjectId::new(3, 0), &Value::Integer(42)).unwrap(), 0);
        assert_eq!(b.push(ObjectId::new(4, 0), &Value::name("X")).unwrap(), 1);
        assert_eq!(b.member_numbers(), vec![3, 4]);

        let stream = b.finish();
        assert_eq!(stream.dict.get("N"), Some(&Value::Integer(2)));
        let first = stream.dict.get("First").unwrap().as_i64().unwrap() as usize;
        let text = String::from_utf8(stream.data.clone()).unwrap();
        assert_eq!(&text[..first], "3 0 4 3\n");
        assert_eq!(&text[first..], "42\n/X\n");
    }

    #[test]
    fn rejects_streams_and_nonzero_generations() {
        let mut b = ObjectStreamBuilder::new(10, 4);
        let stream = Value::Stream(Stream::from_bytes(b"x".to_vec()));
        assert!(matches!(
            b.push(ObjectId::new(3, 0), &stream),
            Err(WriterError::NotCompressible(_))
        ));
        assert!(b.push(ObjectId::new(3, 1), &Value::Null).is_err());
        assert!(b.is_empty());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut b = ObjectStreamBuilder::new(10, 1);
        b.push(ObjectId::new(3, 0), &Value::Null).unwrap();
        assert!(b.is_full());
        assert!(matches!(
            b.push(ObjectId::new(4, 0), &Value::Null),
            Err(WriterError::ObjectStreamFull { capacity: 1 })
        ));
    }
}
