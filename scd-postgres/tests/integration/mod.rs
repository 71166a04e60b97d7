mod postgres_source_test;
mod postgres_store_test;
