//! 流能力声明与 `std::io` 适配。
//!
//! # 契约说明（What）
//! - 管道可读、可写、不可 seek；长度、位置、截断与 seek 一律返回
//!   [`PipeError::Unsupported`]，且不触碰任何内部状态，后续读写照常进行；
//! - `std::io::Read` 的 `Ok(0)` 即流结束；`std::io::Write::write` 总是写入整个缓冲区。

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::{
    error::{PipeError, Result},
    pipe::{Pipe, PipeReader, PipeWriter},
};

impl Pipe {
    pub fn can_read(&self) -> bool {
        true
    }

    pub fn can_write(&self) -> bool {
        true
    }

    pub fn can_seek(&self) -> bool {
        false
    }

    /// 管道没有长度概念。
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Result<u64> {
        Err(PipeError::unsupported("len"))
    }

    pub fn set_len(&self, _len: u64) -> Result<()> {
        Err(PipeError::unsupported("set_len"))
    }

    pub fn position(&self) -> Result<u64> {
        Err(PipeError::unsupported("position"))
    }

    pub fn set_position(&self, _position: u64) -> Result<()> {
        Err(PipeError::unsupported("set_position"))
    }

    pub fn seek(&self, _target: SeekFrom) -> Result<u64> {
        Err(PipeError::unsupported("seek"))
    }
}

impl Read for &Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Pipe::read(self, buf)?)
    }
}

impl Write for &Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Pipe::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Pipe::flush(self)?)
    }
}

impl Seek for &Pipe {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Pipe::seek(self, pos)?)
    }
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Pipe::read(self, buf)?)
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Pipe::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Pipe::flush(self)?)
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(PipeReader::read(self, buf)?)
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        PipeWriter::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.pipe().flush()?)
    }
}
