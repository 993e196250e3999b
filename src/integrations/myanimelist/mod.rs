// src/integrations/myanimelist/mod.rs

pub mod client;

pub use client::MyAnimeListClient;
