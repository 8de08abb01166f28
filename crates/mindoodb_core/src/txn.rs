//! The transaction handle passed into a `changeDoc` callback.

use mindoodb_crdt::Op;
use serde_json::Value;

/// What a `changeDoc` callback is allowed to do to a document: read its
/// current fields and queue field mutations and attachment writes. Nothing
/// here touches storage directly; [`crate::Database::change_doc`] applies
/// the queued operations atomically once the callback returns `Ok`.
pub struct DocTransaction<'a> {
    current: &'a dyn Fn(&str) -> Option<Value>,
    pub(crate) ops: Vec<Op>,
    pub(crate) attachment_ops: Vec<AttachmentOp>,
}

/// A queued attachment mutation, applied after the callback returns.
pub(crate) enum AttachmentOp {
    /// Writes a brand-new attachment from a single in-memory buffer.
    Add {
        name: String,
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// Writes a brand-new attachment from pre-chunked buffers, each applied
    /// to the chain independently so no single buffer need hold the whole
    /// attachment in memory.
    AddChunks {
        name: String,
        chunks: Vec<Vec<u8>>,
        content_type: Option<String>,
    },
    /// Appends bytes to an existing attachment's chunk chain.
    Append { name: String, bytes: Vec<u8> },
    /// Drops the reference to a named attachment (chunks remain until purge).
    Remove { name: String },
}

impl<'a> DocTransaction<'a> {
    pub(crate) fn new(current: &'a dyn Fn(&str) -> Option<Value>) -> Self {
        Self {
            current,
            ops: Vec::new(),
            attachment_ops: Vec::new(),
        }
    }

    /// Reads `key`'s current value, including any earlier `set`/`delete`
    /// calls already queued in this same transaction.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        for op in self.ops.iter().rev() {
            match op {
                Op::Set { key: k, value } if k == key => return Some(value.clone()),
                Op::Delete { key: k } if k == key => return None,
                _ => {}
            }
        }
        (self.current)(key)
    }

    /// Queues `key = value`.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.ops.push(Op::Set { key: key.into(), value });
    }

    /// Queues removal of `key`.
    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(Op::Delete { key: key.into() });
    }

    /// Queues writing a brand-new attachment from a single buffer.
    pub fn add_attachment(&mut self, name: impl Into<String>, bytes: Vec<u8>, content_type: Option<String>) {
        self.attachment_ops.push(AttachmentOp::Add {
            name: name.into(),
            bytes,
            content_type,
        });
    }

    /// Queues writing a brand-new attachment from pre-chunked buffers,
    /// bounding peak memory use to one chunk rather than the whole payload.
    pub fn add_attachment_stream(&mut self, name: impl Into<String>, chunks: Vec<Vec<u8>>, content_type: Option<String>) {
        self.attachment_ops.push(AttachmentOp::AddChunks {
            name: name.into(),
            chunks,
            content_type,
        });
    }

    /// Queues appending bytes to an existing attachment.
    pub fn append_to_attachment(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.attachment_ops.push(AttachmentOp::Append { name: name.into(), bytes });
    }

    /// Queues removing a named attachment reference.
    pub fn remove_attachment(&mut self, name: impl Into<String>) {
        self.attachment_ops.push(AttachmentOp::Remove { name: name.into() });
    }
}
