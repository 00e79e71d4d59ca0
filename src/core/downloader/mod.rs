mod client;
mod download;

pub use client::Downloader;
pub use download::{Download, DownloadOutcome, DownloadState};
