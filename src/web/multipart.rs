//! `multipart/form-data` parsing over the exchange's body stream.

use std::io;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::io::AsyncWriteExt;

use crate::error::Error;
use crate::form::{
    FileContent, FilePart, MultipartForm, MULTIPART_MEMORY_LIMIT, MULTIPART_VALUE_ALLOWANCE,
};

/// Parses `stream` as a multipart form described by `content_type`.
///
/// Plain values, and file parts kept in memory, count against an overall
/// budget of [`MULTIPART_MEMORY_LIMIT`] + [`MULTIPART_VALUE_ALLOWANCE`]
/// bytes. File parts are kept in memory while they fit in what remains of
/// [`MULTIPART_MEMORY_LIMIT`], and written to a temporary file otherwise.
/// Parts without a form name are skipped.
pub(crate) async fn parse_form<S>(content_type: &str, stream: S) -> Result<MultipartForm, Error>
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    let boundary = multer::parse_boundary(content_type)?;
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = MultipartForm::new();
    let mut memory_left = MULTIPART_MEMORY_LIMIT;
    let value_limit = MULTIPART_MEMORY_LIMIT + MULTIPART_VALUE_ALLOWANCE;
    let mut values_left = value_limit;

    while let Some(mut field) = multipart.next_field().await? {
        let name = match field.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        match field.file_name().map(str::to_string) {
            None => {
                let mut value = BytesMut::new();
                while let Some(chunk) = field.chunk().await? {
                    values_left = values_left
                        .checked_sub(chunk.len() as u64)
                        .ok_or(Error::FormTooLarge { limit: value_limit })?;
                    value.extend_from_slice(&chunk);
                }
                form.push_value(name, String::from_utf8_lossy(&value).into_owned());
            }
            Some(filename) => {
                let headers = field.headers().clone();
                let mut head = BytesMut::new();
                let mut spill = false;

                while let Some(chunk) = field.chunk().await? {
                    head.extend_from_slice(&chunk);
                    if head.len() as u64 > memory_left {
                        spill = true;
                        break;
                    }
                }

                let part = if spill {
                    let (size, path) = spill_to_disk(head, &mut field).await?;
                    tracing::debug!(field = %name, filename = %filename, size, "multipart file part spilled to disk");
                    FilePart {
                        filename,
                        headers,
                        size,
                        content: FileContent::Disk(path),
                    }
                } else {
                    memory_left -= head.len() as u64;
                    values_left = values_left
                        .checked_sub(head.len() as u64)
                        .ok_or(Error::FormTooLarge { limit: value_limit })?;
                    FilePart {
                        filename,
                        headers,
                        size: head.len() as u64,
                        content: FileContent::Memory(head.freeze()),
                    }
                };
                form.push_file(name, part);
            }
        }
    }

    Ok(form)
}

async fn spill_to_disk(
    head: BytesMut,
    field: &mut multer::Field<'_>,
) -> Result<(u64, tempfile::TempPath), Error> {
    let (file, path) = tempfile::Builder::new()
        .prefix("multipart-")
        .tempfile()?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut size = head.len() as u64;
    file.write_all(&head).await?;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok((size, path))
}
