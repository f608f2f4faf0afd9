pub mod in_memory_reading_repository;
