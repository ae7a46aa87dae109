pub mod links_repository;
