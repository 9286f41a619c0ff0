pub mod signed_ids;
