use std::io::Cursor;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("the synthesised audio is corrupt: {0}")]
    Decode(String),
    #[error("no playback device available: {0}")]
    Device(String),
}

/// A FIFO of decoded audio clips.
pub trait AudioSink {
    /// Append a WAV clip after everything already queued.
    fn append_wav(&mut self, wav: Vec<u8>) -> Result<(), AudioError>;

    /// Number of clips still queued, including the one playing.
    fn queued(&self) -> usize;

    /// Drop the playing clip and everything queued behind it.
    fn clear(&mut self) -> Result<(), AudioError>;

    fn set_speed(&mut self, speed: f32);
}

pub fn decode_wav(wav: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>, AudioError> {
    Decoder::new(Cursor::new(wav)).map_err(|err| AudioError::Decode(err.to_string()))
}

/// Default output device. Not `Send`: it must be created on the thread
/// that uses it.
pub struct RodioSink {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Sink,
    speed: f32,
}

impl RodioSink {
    pub fn open_default() -> Result<Self, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|err| AudioError::Device(err.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|err| AudioError::Device(err.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
            sink,
            speed: 1.0,
        })
    }
}

impl AudioSink for RodioSink {
    fn append_wav(&mut self, wav: Vec<u8>) -> Result<(), AudioError> {
        self.sink.append(decode_wav(wav)?);
        self.sink.play();
        Ok(())
    }

    fn queued(&self) -> usize {
        self.sink.len()
    }

    fn clear(&mut self) -> Result<(), AudioError> {
        self.sink.stop();
        // a stopped sink is not reused
        let sink =
            Sink::try_new(&self.handle).map_err(|err| AudioError::Device(err.to_string()))?;
        sink.set_speed(self.speed);
        self.sink = sink;
        Ok(())
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.sink.set_speed(speed);
    }
}
