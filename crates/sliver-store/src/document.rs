use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use sliver_core::now_iso8601;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Upload size cap (100 MiB).
pub const MAX_DOCUMENT_BYTES: usize = 100 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";
const CURRENT_ID: &str = "current-pdf";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub name: String,
    pub size: u64,
    pub total_pages: u32,
    pub uploaded_at: String,
}

#[derive(Clone, Debug)]
pub struct StoredDocument {
    pub meta: DocumentMeta,
    pub data: Vec<u8>,
}

/// Reject anything that is not a PDF within the size cap.
pub fn validate_pdf(data: &[u8]) -> Result<()> {
    if !data.starts_with(PDF_MAGIC) {
        return Err(StoreError::InvalidData("not a PDF file".to_string()));
    }
    if data.len() > MAX_DOCUMENT_BYTES {
        return Err(StoreError::InvalidData(format!(
            "file size must be under {}MB",
            MAX_DOCUMENT_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

impl Store {
    /// Replace the stored document.
    pub fn save_document(&self, name: &str, data: &[u8], total_pages: u32) -> Result<DocumentMeta> {
        validate_pdf(data)?;
        if total_pages == 0 {
            return Err(StoreError::InvalidData(
                "total pages must be positive".to_string(),
            ));
        }

        let meta = DocumentMeta {
            name: name.to_string(),
            size: data.len() as u64,
            total_pages,
            uploaded_at: now_iso8601(),
        };
        self.conn().execute(
            "INSERT OR REPLACE INTO documents (id, name, size, data, total_pages, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                CURRENT_ID,
                meta.name,
                meta.size as i64,
                data,
                meta.total_pages,
                meta.uploaded_at,
            ],
        )?;
        tracing::info!("stored document '{}' ({} bytes, {} pages)", meta.name, meta.size, total_pages);
        Ok(meta)
    }

    /// Metadata of the stored document, without loading the blob.
    pub fn document_meta(&self) -> Result<Option<DocumentMeta>> {
        let meta = self
            .conn()
            .query_row(
                "SELECT name, size, total_pages, uploaded_at FROM documents WHERE id = ?1",
                [CURRENT_ID],
                |row| {
                    Ok(DocumentMeta {
                        name: row.get(0)?,
                        size: row.get::<_, i64>(1)? as u64,
                        total_pages: row.get(2)?,
                        uploaded_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    pub fn load_document(&self) -> Result<Option<StoredDocument>> {
        let Some(meta) = self.document_meta()? else {
            return Ok(None);
        };
        let data: Vec<u8> = self.conn().query_row(
            "SELECT data FROM documents WHERE id = ?1",
            [CURRENT_ID],
            |row| row.get(0),
        )?;
        Ok(Some(StoredDocument { meta, data }))
    }

    pub fn set_document_pages(&self, total_pages: u32) -> Result<()> {
        if total_pages == 0 {
            return Err(StoreError::InvalidData(
                "total pages must be positive".to_string(),
            ));
        }
        let rows = self.conn().execute(
            "UPDATE documents SET total_pages = ?1 WHERE id = ?2",
            params![total_pages, CURRENT_ID],
        )?;
        if rows == 0 {
            return Err(StoreError::InvalidData("no stored document".to_string()));
        }
        Ok(())
    }

    pub fn delete_document(&self) -> Result<()> {
        self.conn()
            .execute("DELETE FROM documents WHERE id = ?1", [CURRENT_ID])?;
        Ok(())
    }
}
