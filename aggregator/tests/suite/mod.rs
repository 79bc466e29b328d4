mod coordinator;
mod file_backend;
mod read_cache;
mod support;
