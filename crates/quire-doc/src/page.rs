use std::io::Write;

use quire_types::{Dictionary, ObjectId, Stream, Value};
use tracing::debug;

use crate::config::PageSize;
use crate::document::Document;
use crate::error::{DocumentError, DocumentResult};
use crate::xobject::ImageXObject;

impl<W: Write> Document<W> {
    /// Append a page of the configured default size.
    pub fn add_new_page(&mut self) -> DocumentResult<ObjectId> {
        self.add_page_with_size(self.config.page_size)
    }

    /// Append a page with an empty content stream and resource dictionary.
    pub fn add_page_with_size(&mut self, size: PageSize) -> DocumentResult<ObjectId> {
        self.ensure_usable()?;
        let tree = self.page_tree;
        if self.table.is_flushed(tree) {
            return Err(DocumentError::ObjectFlushed(tree));
        }

        let contents = self
            .table
            .allocate(Value::Stream(Stream::from_bytes(Vec::new())))?;
        let mut page = Dictionary::with_type("Page");
        page.insert("Parent", tree);
        page.insert(
            "MediaBox",
            vec![
                Value::Integer(0),
                Value::Integer(0),
                Value::Real(size.width),
                Value::Real(size.height),
            ],
        );
        page.insert("Resources", Dictionary::new());
        page.insert("Contents", contents);
        let page = self.table.allocate(Value::Dictionary(page))?;

        let count = self.pages.len() + 1;
        let tree_dict = self.live_dict_mut(tree)?;
        match tree_dict.get_mut("Kids") {
            Some(kids) => kids.push(page)?,
            None => {
                tree_dict.insert("Kids", vec![Value::Reference(page)]);
            }
        }
        tree_dict.insert("Count", count);
        self.gate.forget(tree);
        self.pages.push(page);
        debug!(%page, number = count, "page added");
        Ok(page)
    }

    /// Register `resource` under `/Resources /<category> /<name>` of `page`.
    pub fn add_page_resource(
        &mut self,
        page: ObjectId,
        category: &str,
        name: &str,
        resource: ObjectId,
    ) -> DocumentResult<()> {
        if !self.table.contains(resource) {
            return Err(DocumentError::UnknownObject(resource));
        }
        self.live_dict_mut(page)?
            .entry_dict("Resources")?
            .entry_dict(category)?
            .insert(name, resource);
        self.gate.forget(page);
        Ok(())
    }

    /// Append operator bytes to the content stream of `page`.
    pub fn append_page_content(&mut self, page: ObjectId, content: &[u8]) -> DocumentResult<()> {
        let contents = self
            .live_dict_mut(page)?
            .require("Contents")?
            .as_reference()?;
        self.live_value_mut(contents)?
            .as_stream_mut()?
            .data
            .extend_from_slice(content);
        Ok(())
    }

    /// Register an image as an indirect stream.
    pub fn add_image(&mut self, image: ImageXObject) -> DocumentResult<ObjectId> {
        self.make_indirect(image.into())
    }

    pub fn pages(&self) -> &[ObjectId] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn last_page(&self) -> Option<ObjectId> {
        self.pages.last().copied()
    }
}
