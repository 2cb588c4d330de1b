// JSON catalog: whole-file load, upsert-by-id merge, atomic whole-file save.
use crate::model::{CatalogError, PersistenceError, Product};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Products keyed by `id`, kept in first-insertion order.
///
/// Stored records that do not parse as a valid `Product` are carried along
/// untouched in `unparsed` and written back on save, unless a newer product
/// with the same id replaces them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<u64, usize>,
    unparsed: Vec<Value>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later duplicates of an id replace earlier ones.
    #[cfg(test)]
    pub fn from_products(products: Vec<Product>) -> Self {
        let mut catalog = Self::new();
        for product in products {
            catalog.upsert(product);
        }
        catalog
    }

    /// Replaces the whole record with the same id, or appends a new one.
    pub fn upsert(&mut self, product: Product) {
        self.unparsed
            .retain(|record| record.get("id").and_then(Value::as_u64) != Some(product.id));
        match self.index.get(&product.id) {
            Some(&pos) => self.products[pos] = product,
            None => {
                self.index.insert(product.id, self.products.len());
                self.products.push(product);
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<&Product> {
        self.index.get(&id).map(|&pos| &self.products[pos])
    }

    /// Every stored record, parsed or not.
    pub fn len(&self) -> usize {
        self.products.len() + self.unparsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn unparsed(&self) -> &[Value] {
        &self.unparsed
    }

    fn records(&self) -> Result<Vec<Value>, serde_json::Error> {
        let mut records = self
            .products()
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        records.extend(self.unparsed.iter().cloned());
        Ok(records)
    }
}

/// Newest-wins merge: every incoming record replaces the existing one with the
/// same id; existing records not mentioned in `incoming` are kept untouched.
pub fn merge(existing: &Catalog, incoming: &[Product]) -> Catalog {
    let mut merged = existing.clone();
    let mut replaced = 0;
    for product in incoming {
        if merged.get(product.id).is_some() {
            replaced += 1;
        }
        merged.upsert(product.clone());
    }
    info!(
        "Merged products: {} replaced, {} new, {} total",
        replaced,
        incoming.len() - replaced,
        merged.len()
    );
    merged
}

fn parse_record(record: Value) -> Result<Product, (Value, String)> {
    let product: Product = match serde_json::from_value(record.clone()) {
        Ok(product) => product,
        Err(e) => return Err((record, e.to_string())),
    };
    match product.validate() {
        Ok(()) => Ok(product),
        Err(e) => Err((record, e.to_string())),
    }
}

fn read_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let content = fs::read_to_string(path)?;
    let records: Vec<Value> =
        serde_json::from_str(&content).map_err(|e| CatalogError::Malformed(e.to_string()))?;

    let mut catalog = Catalog::new();
    for (pos, record) in records.into_iter().enumerate() {
        match parse_record(record) {
            Ok(product) => catalog.upsert(product),
            Err((raw, reason)) => {
                warn!("Keeping record #{} of {} as stored: {}", pos, path.display(), reason);
                catalog.unparsed.push(raw);
            }
        }
    }
    Ok(catalog)
}

/// Never fails: a missing file is a first run, a file that is not a JSON array
/// is logged and treated as empty. Individual invalid records are kept as stored.
pub fn load_catalog(path: &Path) -> Catalog {
    if !path.exists() {
        warn!("File {} not found, starting with an empty catalog", path.display());
        return Catalog::new();
    }
    match read_catalog(path) {
        Ok(catalog) => {
            info!("Loaded {} products from {}", catalog.len(), path.display());
            catalog
        }
        Err(e) => {
            error!("Could not load {}: {}", path.display(), e);
            Catalog::new()
        }
    }
}

/// Raw records as stored, without validation. Used by the read API, which
/// reports invalid records itself.
pub fn load_raw(path: &Path) -> Vec<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Value>>(&content) {
        Ok(records) => records,
        Err(e) => {
            error!("Invalid JSON in {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "catalog".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the full snapshot to a sibling temp file, then renames it over `path`.
pub fn save_catalog(catalog: &Catalog, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(&catalog.records()?)?;
    let tmp = temp_path(path);
    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&json)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        error!("Error saving products to {}: {}", path.display(), e);
        return Err(e.into());
    }

    info!("Saved {} products to {}", catalog.len(), path.display());
    Ok(())
}
