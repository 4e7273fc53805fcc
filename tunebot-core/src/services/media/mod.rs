pub mod transport;
pub mod ytdlp;

pub use transport::FfmpegTransport;
pub use ytdlp::YtDlpResolver;
