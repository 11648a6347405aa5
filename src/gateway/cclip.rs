//! cclip-backed gateway
//!
//! Content comes from the `cclip` CLI (cclipd keeps the actual history).
//! Pin, favorite and manual order are not something cclip knows about, so they
//! live in clipdeck's own redb database as a postcard-encoded OrderBook.

use super::order_book::OrderBook;
use super::{apply_filters, ChangeStream, Gateway, GatewayError};
use crate::core::item::{ContentKind, FetchOptions, Item, ItemId};
use async_trait::async_trait;
use redb::{ReadableDatabase, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

/// redb table holding the order book
pub const LAYOUT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("layout");
const LAYOUT_KEY: &str = "order_book";

/// One row of `cclip list`
#[derive(Debug, Clone, PartialEq)]
pub struct CclipRow {
    pub rowid: u64,
    pub mime_type: String,
    pub preview: String,
    pub tags: Vec<String>,
}

impl CclipRow {
    /// Parse a tab-separated line from `cclip list`
    /// Format: rowid\tmime_type\tpreview[\ttags]
    pub fn from_line(line: &str) -> Result<Self, GatewayError> {
        let parts: Vec<&str> = line.splitn(4, '\t').collect();
        if parts.len() < 3 {
            return Err(GatewayError::Decode(format!(
                "expected at least 3 tab-separated fields, got {:?}",
                line
            )));
        }

        let rowid = parts[0]
            .trim()
            .parse::<u64>()
            .map_err(|e| GatewayError::Decode(format!("bad rowid {:?}: {}", parts[0], e)))?;

        let tags = parts
            .get(3)
            .map(|field| {
                field
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(CclipRow {
            rowid,
            mime_type: parts[1].trim().to_string(),
            preview: parts[2].to_string(),
            tags,
        })
    }
}

pub struct CclipGateway {
    db: Arc<redb::Database>,
    book: Mutex<OrderBook>,
    poll_interval: Duration,
}

impl CclipGateway {
    /// Open the layout database in `data_dir`
    pub fn open(data_dir: &Path, poll_interval: Duration) -> eyre::Result<Self> {
        use eyre::WrapErr;

        std::fs::create_dir_all(data_dir)
            .wrap_err_with(|| format!("Failed to create data dir {:?}", data_dir))?;
        let db_path = data_dir.join("layout.redb");
        let db = redb::Database::create(&db_path)
            .wrap_err_with(|| format!("Failed to open layout database at {:?}", db_path))?;
        let db = Arc::new(db);
        let book = load_book(&db);

        Ok(Self {
            db,
            book: Mutex::new(book),
            poll_interval,
        })
    }

    /// Check if cclip is available on the system
    pub async fn check_available() -> bool {
        Command::new("cclip")
            .arg("-h")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn with_book<T>(
        &self,
        op: impl FnOnce(&mut OrderBook) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut book = self.book.lock().unwrap_or_else(|p| p.into_inner());
        let value = op(&mut book)?;
        save_book(&self.db, &book)?;
        Ok(value)
    }
}

fn load_book(db: &redb::Database) -> OrderBook {
    let read = match db.begin_read() {
        Ok(read) => read,
        Err(_) => return OrderBook::new(),
    };
    // Table does not exist until the first save
    let Ok(table) = read.open_table(LAYOUT_TABLE) else {
        return OrderBook::new();
    };
    match table.get(LAYOUT_KEY) {
        Ok(Some(data)) => postcard::from_bytes(data.value()).unwrap_or_else(|e| {
            crate::core::debug_logger::log_error("decode order book", &e);
            OrderBook::new()
        }),
        _ => OrderBook::new(),
    }
}

fn save_book(db: &redb::Database, book: &OrderBook) -> Result<(), GatewayError> {
    let data = postcard::to_allocvec(book).map_err(|e| GatewayError::Decode(e.to_string()))?;
    let write = db.begin_write().map_err(storage_err)?;
    {
        let mut table = write.open_table(LAYOUT_TABLE).map_err(storage_err)?;
        table
            .insert(LAYOUT_KEY, data.as_slice())
            .map_err(storage_err)?;
    }
    write.commit().map_err(storage_err)?;
    Ok(())
}

fn storage_err(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Transport(format!("layout database: {}", e))
}

async fn run_cclip(args: &[&str]) -> Result<std::process::Output, GatewayError> {
    Ok(Command::new("cclip")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?)
}

/// All rows, newest first
async fn list_rows() -> Result<Vec<CclipRow>, GatewayError> {
    // Try with tags field first (newer cclip), fall back to without tags
    let mut output = run_cclip(&["list", "rowid,mime_type,preview,tag"]).await?;
    if !output.status.success()
        && String::from_utf8_lossy(&output.stderr).contains("invalid field: tag")
    {
        output = run_cclip(&["list", "rowid,mime_type,preview"]).await?;
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("unable to open database file") {
            return Err(GatewayError::Transport(
                "cclip database not found. Make sure cclipd is running".to_string(),
            ));
        }
        return Err(GatewayError::Transport(format!(
            "cclip list failed: {}",
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut rows = Vec::new();
    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        match CclipRow::from_line(line) {
            Ok(row) => rows.push(row),
            Err(e) => crate::core::debug_logger::log_error("parse cclip line", &e),
        }
    }
    Ok(rows)
}

/// Cheap change fingerprint: the list of row ids
async fn row_fingerprint() -> Result<Vec<u64>, GatewayError> {
    let output = run_cclip(&["list", "rowid"]).await?;
    if !output.status.success() {
        return Err(GatewayError::Transport("cclip list rowid failed".to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect())
}

#[async_trait]
impl Gateway for CclipGateway {
    async fn fetch_items(&self, options: FetchOptions) -> Result<Vec<Item>, GatewayError> {
        let rows = list_rows().await?;
        let live: Vec<ItemId> = rows.iter().map(|row| ItemId(row.rowid)).collect();

        let placements = {
            let mut book = self.book.lock().unwrap_or_else(|p| p.into_inner());
            if book.reconcile(&live) {
                save_book(&self.db, &book)?;
            }
            book.placements()
        };

        let mut by_id: HashMap<u64, CclipRow> =
            rows.into_iter().map(|row| (row.rowid, row)).collect();
        let count = by_id.len() as i64;
        let ordered = placements
            .into_iter()
            .filter_map(|placement| {
                let row = by_id.remove(&placement.id.0)?;
                Some(Item {
                    id: placement.id,
                    kind: ContentKind::from_mime(&row.mime_type),
                    mime_type: row.mime_type,
                    preview: row.preview,
                    is_pinned: placement.is_pinned,
                    is_favorite: placement.is_favorite,
                    sort_order: placement.sort_order,
                    // cclip does not expose capture time; rowids grow monotonically
                    created_at: count.saturating_sub(placement.sort_order),
                    groups: row.tags,
                })
            })
            .collect();

        Ok(apply_filters(ordered, &options))
    }

    async fn toggle_pin(&self, id: ItemId) -> Result<bool, GatewayError> {
        self.with_book(|book| book.toggle_pin(id))
    }

    async fn toggle_favorite(&self, id: ItemId) -> Result<bool, GatewayError> {
        self.with_book(|book| book.toggle_favorite(id))
    }

    async fn move_item(&self, from: ItemId, to: ItemId) -> Result<(), GatewayError> {
        self.with_book(|book| book.move_item(from, to))
    }

    async fn delete(&self, id: ItemId) -> Result<(), GatewayError> {
        let rowid = id.0.to_string();
        let output = run_cclip(&["delete", &rowid]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Already gone is fine
            if !stderr.contains("not found") && !stderr.contains("no such") {
                return Err(GatewayError::Transport(format!(
                    "cclip delete {} failed: {}",
                    rowid,
                    stderr.trim()
                )));
            }
        }
        self.with_book(|book| {
            book.remove(id);
            Ok(())
        })
    }

    async fn groups(&self) -> Result<Vec<String>, GatewayError> {
        let output = run_cclip(&["tags"]).await?;
        if !output.status.success() {
            return Err(GatewayError::Transport(format!(
                "Failed to list tags: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn copy_to_clipboard(&self, id: ItemId) -> Result<(), GatewayError> {
        let rowid = id.0.to_string();
        let mime_type = list_rows()
            .await?
            .into_iter()
            .find(|row| row.rowid == id.0)
            .map(|row| row.mime_type)
            .ok_or(GatewayError::NotFound(id))?;

        let mut cclip = Command::new("cclip")
            .args(["get", &rowid])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = cclip
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Transport("cclip get produced no stdout".to_string()))?;
        let stdin: Stdio = stdout.try_into()?;

        let mut copier = if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            let mut cmd = Command::new("wl-copy");
            cmd.args(["-t", &mime_type]);
            cmd
        } else {
            let mut cmd = Command::new("xclip");
            cmd.args(["-selection", "clipboard", "-t", &mime_type]);
            cmd
        };
        let mut copier = copier
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let cclip_status = cclip.wait().await?;
        let copy_status = copier.wait().await?;
        if !cclip_status.success() {
            return Err(GatewayError::Transport("cclip get failed".to_string()));
        }
        if !copy_status.success() {
            return Err(GatewayError::Transport("clipboard copy tool failed".to_string()));
        }
        Ok(())
    }

    fn subscribe_changes(&self) -> Result<ChangeStream, GatewayError> {
        let (tx, rx) = mpsc::channel::<()>(1);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            let mut last: Option<Vec<u64>> = None;
            loop {
                ticker.tick().await;
                let Ok(current) = row_fingerprint().await else {
                    continue;
                };
                let changed = last.as_ref().is_some_and(|prev| *prev != current);
                last = Some(current);
                // A full channel already carries a pending notification
                if changed && matches!(tx.try_send(()), Err(mpsc::error::TrySendError::Closed(_))) {
                    return;
                }
                if tx.is_closed() {
                    return;
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|()| ((), rx))
        });
        Ok(Box::pin(stream))
    }
}
