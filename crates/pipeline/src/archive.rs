//! Streaming zip download of a package.
//!
//! The archive is written on a blocking thread by [`zip::ZipWriter`] in
//! streaming mode into one end of an in-memory pipe; the HTTP body reads the
//! other end. Remote objects are pulled through [`SyncIoBridge`] into a
//! [`SpooledTempFile`] before their entry starts, so an entry name is only
//! chosen once the read outcome is known. Memory use stays bounded by the
//! pipe, the copy buffer and the in-memory spool limit.
//!
//! Each entry is isolated: a remote object that cannot be opened or read is
//! replaced by an `ERRO_<name>.txt` notice. Bytes read before a mid-stream
//! failure are kept as `PARCIAL_<name>` next to the notice. Only a failed
//! write, meaning the client went away, stops assembly.

use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use sgpi_cloud::RemoteStorage;
use sgpi_core::document::{is_shortcut_mime, DocumentPayload};
use sgpi_core::links::{link_document_name, shortcut_payload};
use sgpi_core::naming::{archive_file_name, sanitize_filename, unique_entry_name};
use sgpi_core::types::DbId;
use sgpi_db::models::document::Document;
use tempfile::SpooledTempFile;
use tokio::runtime::Handle;
use tokio_util::io::{ReaderStream, SyncIoBridge};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::ledger::{DocumentLedger, LedgerError};

/// In-memory pipe capacity between the zip writer and the response body.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Copy buffer size for remote object bytes.
const COPY_CHUNK: usize = 64 * 1024;

/// Spooled objects larger than this move from memory to a temp file.
const SPOOL_IN_MEMORY: usize = 8 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Package {0} not found")]
    PackageNotFound(DbId),

    #[error("Package {0} has no completed documents to download")]
    NothingToDownload(DbId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Where an entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Stream a remote object.
    Remote(String),
    /// Synthesize an InternetShortcut payload for this URL.
    Shortcut(String),
    /// Nothing to read; the entry is written as an error notice.
    Missing,
}

/// One planned archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub document_id: DbId,
    pub name: String,
    pub source: EntrySource,
}

/// Loads what a package download needs and hands out archives.
#[derive(Clone)]
pub struct ArchiveAssembler {
    ledger: Arc<dyn DocumentLedger>,
    storage: Arc<dyn RemoteStorage>,
}

impl ArchiveAssembler {
    pub fn new(ledger: Arc<dyn DocumentLedger>, storage: Arc<dyn RemoteStorage>) -> Self {
        Self { ledger, storage }
    }

    /// Resolve the package and its COMPLETED documents.
    ///
    /// Fails before any byte is produced when the package does not exist or
    /// has nothing to download.
    pub async fn prepare(&self, package_id: DbId) -> Result<PackageArchive, ArchiveError> {
        let package = self
            .ledger
            .find_package(package_id)
            .await?
            .ok_or(ArchiveError::PackageNotFound(package_id))?;

        let documents = self.ledger.completed_documents(package_id).await?;
        if documents.is_empty() {
            return Err(ArchiveError::NothingToDownload(package_id));
        }

        Ok(PackageArchive {
            package_id,
            file_name: archive_file_name(&package.title),
            entries: plan_entries(&documents),
            storage: Arc::clone(&self.storage),
        })
    }
}

/// Map documents to uniquely named entries.
pub fn plan_entries(documents: &[Document]) -> Vec<ArchiveEntry> {
    let mut taken = HashSet::new();
    documents
        .iter()
        .map(|doc| {
            let source = match doc.payload() {
                DocumentPayload::ExternalLink(url) if !url.is_empty() => EntrySource::Shortcut(url),
                DocumentPayload::RemoteObject(id) => match doc.external_redirect_link.as_deref() {
                    Some(url) if is_shortcut_mime(&doc.mime_type) => {
                        EntrySource::Shortcut(url.to_string())
                    }
                    _ => EntrySource::Remote(id),
                },
                _ => EntrySource::Missing,
            };

            let base = match source {
                EntrySource::Shortcut(_) => sanitize_filename(&link_document_name(&doc.original_name)),
                _ => sanitize_filename(&doc.original_name),
            };
            let base = if base.is_empty() {
                format!("documento_{}", doc.id)
            } else {
                base
            };

            ArchiveEntry {
                document_id: doc.id,
                name: unique_entry_name(&base, &mut taken),
                source,
            }
        })
        .collect()
}

/// A ready-to-stream package archive.
pub struct PackageArchive {
    package_id: DbId,
    file_name: String,
    entries: Vec<ArchiveEntry>,
    storage: Arc<dyn RemoteStorage>,
}

impl PackageArchive {
    /// Download file name, e.g. `Provas_P1.zip`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Start assembly and return the archive bytes as a stream.
    ///
    /// Must be called from within a Tokio runtime. Dropping the stream stops
    /// assembly and releases any open remote reader.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
        let handle = Handle::current();
        let package_id = self.package_id;

        tokio::task::spawn_blocking(move || {
            let sink = SyncIoBridge::new_with_handle(writer, handle.clone());
            match write_archive(sink, &self.entries, self.storage.as_ref(), &handle) {
                Ok(summary) => tracing::info!(
                    package_id,
                    entries = summary.entries,
                    failed = summary.failed,
                    "Package archive streamed"
                ),
                Err(e) => tracing::warn!(
                    package_id,
                    error = %e,
                    "Package archive aborted"
                ),
            }
        });

        ReaderStream::new(reader)
    }
}

/// Counts reported after a complete archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub failed: usize,
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true)
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Write every entry into a streaming zip on `sink`. Blocking; runs on a
/// blocking thread with `handle` pointing at the runtime.
fn write_archive<W: Write>(
    sink: W,
    entries: &[ArchiveEntry],
    storage: &dyn RemoteStorage,
    handle: &Handle,
) -> io::Result<ArchiveSummary> {
    let mut zip = ZipWriter::new_stream(sink);
    let mut taken = entries.iter().map(|e| e.name.clone()).collect::<HashSet<_>>();
    let mut summary = ArchiveSummary::default();
    let mut buf = vec![0u8; COPY_CHUNK];

    for entry in entries {
        let failure = match &entry.source {
            EntrySource::Shortcut(url) => {
                zip.start_file(entry.name.as_str(), entry_options())
                    .map_err(io::Error::other)?;
                zip.write_all(shortcut_payload(url).as_bytes())?;
                None
            }
            EntrySource::Missing => Some("documento sem objeto remoto".to_string()),
            EntrySource::Remote(object_id) => {
                let fetched = match handle.block_on(storage.open_read_stream(object_id)) {
                    Err(e) => Fetched::Failed(e.to_string()),
                    Ok(stream) => {
                        let mut reader = SyncIoBridge::new_with_handle(stream, handle.clone());
                        fetch_object(&mut reader, &mut buf)
                    }
                };
                match fetched {
                    Fetched::Complete(spool) => {
                        write_spooled(&mut zip, &entry.name, spool)?;
                        None
                    }
                    Fetched::Partial(spool, message) => {
                        let partial_name =
                            unique_entry_name(&format!("PARCIAL_{}", entry.name), &mut taken);
                        write_spooled(&mut zip, &partial_name, spool)?;
                        Some(message)
                    }
                    Fetched::Failed(message) => Some(message),
                }
            }
        };

        summary.entries += 1;
        if let Some(message) = failure {
            tracing::warn!(
                document_id = entry.document_id,
                entry = %entry.name,
                error = %message,
                "Archive entry replaced by error notice"
            );
            let notice_name = unique_entry_name(&format!("ERRO_{}.txt", entry.name), &mut taken);
            zip.start_file(notice_name, entry_options())
                .map_err(io::Error::other)?;
            zip.write_all(format!("Erro ao baixar: {message}\n").as_bytes())?;
            summary.failed += 1;
        }
    }

    zip.finish().map_err(io::Error::other)?;
    Ok(summary)
}

/// Outcome of pulling one remote object into a spool.
enum Fetched {
    Complete(SpooledTempFile),
    /// Some bytes arrived before the read failed.
    Partial(SpooledTempFile, String),
    /// Nothing usable arrived.
    Failed(String),
}

fn fetch_object<R: Read>(reader: &mut R, buf: &mut [u8]) -> Fetched {
    let mut spool = SpooledTempFile::new(SPOOL_IN_MEMORY);
    match copy_rest(reader, &mut spool, buf) {
        Ok(()) => Fetched::Complete(spool),
        Err(CopyError::Read(e)) => match spool.stream_position() {
            Ok(written) if written > 0 => {
                Fetched::Partial(spool, format!("leitura interrompida: {e}"))
            }
            _ => Fetched::Failed(e.to_string()),
        },
        Err(CopyError::Write(e)) => Fetched::Failed(format!("falha no arquivo temporário: {e}")),
    }
}

/// Start an entry named `name` and copy the spooled bytes into it.
fn write_spooled<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    mut spool: SpooledTempFile,
) -> io::Result<()> {
    spool.seek(SeekFrom::Start(0))?;
    zip.start_file(name, entry_options()).map_err(io::Error::other)?;
    io::copy(&mut spool, zip)?;
    Ok(())
}

fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn copy_rest<R: Read, W: Write>(reader: &mut R, writer: &mut W, buf: &mut [u8]) -> Result<(), CopyError> {
    loop {
        let n = read_chunk(reader, buf).map_err(CopyError::Read)?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
    }
}
