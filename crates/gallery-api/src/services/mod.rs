pub mod ffmpeg;

pub use ffmpeg::FfmpegConversionHandler;
