use super::models::{Owner, OwnerId, Record, RecordId};
use super::sqlite::Database;
use super::{OwnerDirectory, RecordStore};
use crate::error::Error;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

const RECORD_COLUMNS: &str = "id, owner_id, name, folder, created_at, file_size";

fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        folder: row.get(3)?,
        created_at: row.get(4)?,
        file_size: row.get(5)?,
    })
}

fn row_to_owner(row: &Row) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: row.get(0)?,
        login: row.get(1)?,
        display_name: row.get(2)?,
    })
}

impl RecordStore for Database {
    fn records_for_owner(&self, owner: OwnerId) -> Result<Vec<Record>, Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM record WHERE owner_id = ?1 ORDER BY created_at DESC",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![owner], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn records_named(&self, name: &str) -> Result<Vec<Record>, Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM record WHERE name = ?1 ORDER BY created_at ASC",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![name], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn record(&self, id: RecordId) -> Result<Option<Record>, Error> {
        let conn = self.connection()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM record WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_records(&self, records: &[Record]) -> Result<usize, Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO record (id, owner_id, name, folder, created_at, file_size) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                count += stmt.execute(params![
                    record.id,
                    record.owner,
                    record.name,
                    record.folder,
                    record.created_at,
                    record.file_size,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} records", count);
        Ok(count)
    }

    fn delete_records(&self, ids: &[RecordId]) -> Result<usize, Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM record WHERE id = ?1")?;
            for id in ids {
                count += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        debug!("Deleted {} records", count);
        Ok(count)
    }

    fn update_record(&self, record: &Record) -> Result<(), Error> {
        let changed = self.connection()?.execute(
            "UPDATE record SET owner_id = ?2, name = ?3, folder = ?4, created_at = ?5, \
             file_size = ?6 WHERE id = ?1",
            params![
                record.id,
                record.owner,
                record.name,
                record.folder,
                record.created_at,
                record.file_size,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Record {}", record.id)));
        }
        Ok(())
    }

    fn max_record_id(&self) -> Result<Option<RecordId>, Error> {
        let max = self
            .connection()?
            .query_row("SELECT MAX(id) FROM record", [], |row| row.get(0))?;
        Ok(max)
    }
}

impl OwnerDirectory for Database {
    fn owners(&self) -> Result<Vec<Owner>, Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id, login, display_name FROM owner ORDER BY id")?;
        let owners = stmt
            .query_map([], row_to_owner)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(owners)
    }

    fn owner(&self, id: OwnerId) -> Result<Option<Owner>, Error> {
        let owner = self
            .connection()?
            .query_row(
                "SELECT id, login, display_name FROM owner WHERE id = ?1",
                params![id],
                row_to_owner,
            )
            .optional()?;
        Ok(owner)
    }

    fn owner_by_login(&self, login: &str) -> Result<Option<Owner>, Error> {
        let owner = self
            .connection()?
            .query_row(
                "SELECT id, login, display_name FROM owner WHERE login = ?1",
                params![login],
                row_to_owner,
            )
            .optional()?;
        Ok(owner)
    }

    fn add_owner(&self, login: &str, display_name: &str) -> Result<Owner, Error> {
        Owner::validate_login(login)?;
        if self.owner_by_login(login)?.is_some() {
            return Err(Error::Conflict(format!("Owner '{}' already exists", login)));
        }

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO owner (login, display_name) VALUES (?1, ?2)",
            params![login, display_name],
        )?;
        Ok(Owner {
            id: conn.last_insert_rowid(),
            login: login.to_string(),
            display_name: display_name.to_string(),
        })
    }

    fn remove_owner(&self, login: &str) -> Result<bool, Error> {
        let removed = self
            .connection()?
            .execute("DELETE FROM owner WHERE login = ?1", params![login])?;
        Ok(removed > 0)
    }
}
