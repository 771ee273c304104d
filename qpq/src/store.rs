use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use time::OffsetDateTime;

pub const MAX_FAVORITES: usize = 20;
pub const MAX_RECENT: usize = 20;

/// Favorites and recently run commands, keyed by command name.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating state directory {}", dir.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite db at {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Flip the favorite flag for `name`. Returns whether it is now a favorite.
    pub fn toggle_favorite(&mut self, name: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM favorites WHERE name = ?1", params![name])?;
        if removed > 0 {
            tx.commit()?;
            return Ok(false);
        }

        let count: i64 = tx.query_row("SELECT count(*) FROM favorites", [], |r| r.get(0))?;
        if count as usize >= MAX_FAVORITES {
            anyhow::bail!("at most {MAX_FAVORITES} favorites are allowed; remove one first");
        }

        tx.execute(
            "INSERT INTO favorites(name, added) VALUES (?1, ?2)",
            params![name, now_epoch()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Favorites in the order they were added.
    pub fn favorites(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM favorites ORDER BY added ASC, rowid ASC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Note that `name` just ran, keeping only the newest entries.
    pub fn record_recent(&mut self, name: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        let seq: i64 = tx.query_row("SELECT coalesce(max(seq), 0) + 1 FROM recent", [], |r| {
            r.get(0)
        })?;
        tx.execute(
            r#"
            INSERT INTO recent(name, last_run, seq) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET last_run = excluded.last_run, seq = excluded.seq
            "#,
            params![name, now_epoch(), seq],
        )?;
        tx.execute(
            "DELETE FROM recent WHERE name NOT IN (SELECT name FROM recent ORDER BY seq DESC LIMIT ?1)",
            params![MAX_RECENT as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Recently run command names with their epoch, newest-first.
    pub fn recent(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, last_run FROM recent ORDER BY seq DESC")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn last_run(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT last_run FROM recent WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?)
    }

    /// Drop every trace of `name`, e.g. after it was removed from the catalog.
    pub fn forget(&mut self, name: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM favorites WHERE name = ?1", params![name])?;
        tx.execute("DELETE FROM recent WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
          name TEXT PRIMARY KEY,
          added INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recent (
          name TEXT PRIMARY KEY,
          last_run INTEGER NOT NULL,
          seq INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recent_seq ON recent(seq);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO meta(key,value) VALUES('schema_version','1')",
        [],
    )?;

    Ok(())
}

fn now_epoch() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn toggle_favorite_adds_then_removes() {
        let mut store = StateStore::open_in_memory().unwrap();
        assert!(store.toggle_favorite("Git Status").unwrap());
        assert!(store.toggle_favorite("Disk Usage").unwrap());
        assert_eq!(store.favorites().unwrap(), vec!["Git Status", "Disk Usage"]);

        assert!(!store.toggle_favorite("Git Status").unwrap());
        assert_eq!(store.favorites().unwrap(), vec!["Disk Usage"]);
    }

    #[test]
    fn favorites_are_capped() {
        let mut store = StateStore::open_in_memory().unwrap();
        for i in 0..MAX_FAVORITES {
            store.toggle_favorite(&format!("cmd {i}")).unwrap();
        }
        let err = store.toggle_favorite("one too many").unwrap_err();
        assert!(err.to_string().contains("at most"));
        // Removing still works at the cap.
        assert!(!store.toggle_favorite("cmd 0").unwrap());
    }

    #[test]
    fn recent_is_newest_first_without_duplicates() {
        let mut store = StateStore::open_in_memory().unwrap();
        store.record_recent("a").unwrap();
        store.record_recent("b").unwrap();
        store.record_recent("a").unwrap();

        let names: Vec<String> = store.recent().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.last_run("a").unwrap().is_some());
        assert!(store.last_run("zzz").unwrap().is_none());
    }

    #[test]
    fn recent_keeps_only_the_newest_entries() {
        let mut store = StateStore::open_in_memory().unwrap();
        for i in 0..MAX_RECENT + 5 {
            store.record_recent(&format!("cmd {i}")).unwrap();
        }
        let recent = store.recent().unwrap();
        assert_eq!(recent.len(), MAX_RECENT);
        assert_eq!(recent[0].0, format!("cmd {}", MAX_RECENT + 4));
        assert!(store.last_run("cmd 0").unwrap().is_none());
    }

    #[test]
    fn forget_clears_both_lists() {
        let mut store = StateStore::open_in_memory().unwrap();
        store.toggle_favorite("x").unwrap();
        store.record_recent("x").unwrap();
        store.forget("x").unwrap();
        assert!(store.favorites().unwrap().is_empty());
        assert!(store.recent().unwrap().is_empty());
    }

    #[test]
    fn state_persists_on_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("state.sqlite");
        {
            let mut store = StateStore::open(&path).unwrap();
            store.toggle_favorite("Git Status").unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.favorites().unwrap(), vec!["Git Status"]);
    }
}
