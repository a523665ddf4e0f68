// Copyright 2023 Remi Bernotavicius

use crate::database;
use crate::Result;
use database::models::NewIngredient;
use diesel::prelude::Connection as _;
use diesel::RunQueryDsl as _;
use std::path::Path;

mod csv;

const BATCH_SIZE: usize = 100;

/// Loads the ingredient catalog from a CSV file a batch at a time. Rows already in the catalog
/// (same name and unit) are skipped, so a file can be imported again safely.
pub struct IngredientImporter {
    rows: Vec<csv::Row>,
    num_imported: usize,
    num_skipped: usize,
    total_num_rows: usize,
}

impl IngredientImporter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_rows(csv::decode_ingredients_from_path(path)?))
    }

    fn from_rows(rows: Vec<csv::Row>) -> Self {
        Self {
            total_num_rows: rows.len(),
            rows,
            num_imported: 0,
            num_skipped: 0,
        }
    }

    pub fn done(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_imported(&self) -> usize {
        self.num_imported
    }

    pub fn num_skipped(&self) -> usize {
        self.num_skipped
    }

    pub fn percent_done(&self) -> f32 {
        if self.total_num_rows == 0 {
            return 1.0;
        }
        (self.num_imported + self.num_skipped) as f32 / self.total_num_rows as f32
    }

    /// Inserts the next batch in a single transaction.
    pub fn import_one(&mut self, conn: &mut database::Connection) -> Result<()> {
        use database::schema::ingredients::dsl::*;

        let batch_len = self.rows.len().min(BATCH_SIZE);
        let batch: Vec<_> = self.rows.drain(..batch_len).collect();

        let inserted = conn.transaction(|conn| {
            let mut inserted = 0;
            for row in &batch {
                inserted += diesel::insert_into(ingredients)
                    .values(NewIngredient {
                        name: &row.name,
                        measurement_unit: &row.measurement_unit,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }
            diesel::QueryResult::Ok(inserted)
        })?;

        if let (Some(first), Some(last)) = (batch.first(), batch.last()) {
            log::debug!(
                "lines {}-{}: {inserted} new ingredients",
                first.line,
                last.line
            );
        }
        self.num_imported += inserted;
        self.num_skipped += batch.len() - inserted;
        Ok(())
    }
}

pub fn import_ingredients(mut conn: database::Connection, path: impl AsRef<Path>) -> Result<()> {
    let mut importer = IngredientImporter::new(path)?;

    while !importer.done() {
        importer.import_one(&mut conn)?;
        log::info!("imported {:.0}%", importer.percent_done() * 100.0);
    }
    log::info!(
        "{} ingredients imported, {} already present",
        importer.num_imported(),
        importer.num_skipped()
    );

    Ok(())
}

#[cfg(test)]
fn rows(count: usize) -> Vec<csv::Row> {
    (0..count)
        .map(|n| csv::Row {
            line: n as u64 + 1,
            name: format!("ingredient {n}"),
            measurement_unit: "g".into(),
        })
        .collect()
}

#[test]
fn import_in_batches() {
    use crate::catalog;

    let mut conn = database::test_connection();
    let mut importer = IngredientImporter::from_rows(rows(BATCH_SIZE + 5));

    importer.import_one(&mut conn).unwrap();
    assert!(!importer.done());
    assert_eq!(importer.num_imported(), BATCH_SIZE);

    importer.import_one(&mut conn).unwrap();
    assert!(importer.done());
    assert_eq!(importer.num_imported(), BATCH_SIZE + 5);
    assert_eq!(importer.num_skipped(), 0);
    assert_eq!(importer.percent_done(), 1.0);

    let found = catalog::search_ingredients_by_prefix(&mut conn, "ingredient 10").unwrap();
    assert_eq!(found.len(), 6);
}

#[test]
fn reimport_skips_existing() {
    use crate::catalog;

    let mut conn = database::test_connection();
    catalog::create_ingredient(&mut conn, "ingredient 1", "g").unwrap();

    let mut importer = IngredientImporter::from_rows(rows(3));
    importer.import_one(&mut conn).unwrap();
    assert_eq!(importer.num_imported(), 2);
    assert_eq!(importer.num_skipped(), 1);

    let mut again = IngredientImporter::from_rows(rows(3));
    again.import_one(&mut conn).unwrap();
    assert_eq!(again.num_imported(), 0);
    assert_eq!(again.num_skipped(), 3);
}

#[test]
fn empty_file_is_done() {
    let importer = IngredientImporter::from_rows(vec![]);
    assert!(importer.done());
    assert_eq!(importer.percent_done(), 1.0);
}
