mod memory_import;
mod tantivy_import;
