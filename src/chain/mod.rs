pub mod oku_client;
