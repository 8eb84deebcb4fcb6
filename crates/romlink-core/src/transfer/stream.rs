//! Contiguous block transfers within a single session

use super::{drain_block, fill_block, flush_sink, TransferRequest, TransferStats};
use crate::error::Result;
use crate::frame::ControlFrame;
use crate::link::{with_session, Link};
use crate::progress::TransferProgress;

/// Stream `source` into device memory at `request.base_address`
///
/// Sends one load header, then writes the source in blocks of up to
/// `block_size` bytes until `max_length` bytes have been written or the
/// source is exhausted. Running out of source data is a normal end. The
/// final block is written exactly as read, without padding.
///
/// `scratch` must hold at least `block_size` bytes.
pub fn load_with_buffer<L, R, P>(
    link: &mut L,
    source: &mut R,
    request: &TransferRequest,
    scratch: &mut [u8],
    progress: &mut P,
) -> Result<TransferStats>
where
    L: Link + ?Sized,
    R: embedded_io::Read + ?Sized,
    P: TransferProgress + ?Sized,
{
    let block = request.block(scratch)?;
    let block_size = block.len();
    let limit = request.max_length as usize;

    log::debug!(
        "stream: load to 0x{:08X} (max {} bytes, {} byte blocks)",
        request.base_address,
        limit,
        block_size
    );
    progress.started(request.mode, request.max_length);

    let mut stats = with_session(link, |session| {
        session.send_frame(&ControlFrame::load(request.base_address))?;

        let mut stats = TransferStats::default();
        let mut written = 0usize;
        while written < limit {
            let want = block_size.min(limit - written);
            let got = fill_block(source, &mut block[..want])?;
            if got == 0 {
                log::debug!("stream: source exhausted after {} bytes", written);
                break;
            }

            session.write(&block[..got])?;
            written += got;
            stats.blocks += 1;
            progress.advanced(written as u32);
            log::trace!("stream: wrote block of {} bytes ({} total)", got, written);

            if got < want {
                log::debug!("stream: source exhausted after {} bytes", written);
                break;
            }
        }
        stats.bytes = written as u32;
        Ok(stats)
    })?;
    stats.sessions = 1;

    log::info!(
        "Loaded {} bytes to 0x{:08X} in {} blocks",
        stats.bytes,
        request.base_address,
        stats.blocks
    );
    progress.finished(&stats);
    Ok(stats)
}

/// Read `request.max_length` bytes from device memory into `sink`
///
/// Sends one save header, then reads full blocks (the last one capped to
/// the remaining length) and appends each to `sink`.
///
/// `scratch` must hold at least `block_size` bytes.
pub fn save_with_buffer<L, W, P>(
    link: &mut L,
    sink: &mut W,
    request: &TransferRequest,
    scratch: &mut [u8],
    progress: &mut P,
) -> Result<TransferStats>
where
    L: Link + ?Sized,
    W: embedded_io::Write + ?Sized,
    P: TransferProgress + ?Sized,
{
    let block = request.block(scratch)?;
    let block_size = block.len();
    let length = request.max_length as usize;

    log::debug!(
        "stream: save {} bytes from 0x{:08X} ({} byte blocks)",
        length,
        request.base_address,
        block_size
    );
    progress.started(request.mode, request.max_length);

    let mut stats = with_session(link, |session| {
        session.send_frame(&ControlFrame::save(request.base_address))?;

        let mut stats = TransferStats::default();
        let mut saved = 0usize;
        while saved < length {
            let chunk = block_size.min(length - saved);
            session.read(&mut block[..chunk])?;
            drain_block(sink, &block[..chunk])?;
            saved += chunk;
            stats.blocks += 1;
            progress.advanced(saved as u32);
        }
        stats.bytes = saved as u32;
        Ok(stats)
    })?;
    stats.sessions = 1;
    flush_sink(sink)?;

    log::info!(
        "Saved {} bytes from 0x{:08X} in {} blocks",
        stats.bytes,
        request.base_address,
        stats.blocks
    );
    progress.finished(&stats);
    Ok(stats)
}

/// [`load_with_buffer`] with an allocated scratch block
#[cfg(feature = "alloc")]
pub fn load<L, R, P>(
    link: &mut L,
    source: &mut R,
    request: &TransferRequest,
    progress: &mut P,
) -> Result<TransferStats>
where
    L: Link + ?Sized,
    R: embedded_io::Read + ?Sized,
    P: TransferProgress + ?Sized,
{
    request.validate()?;
    let mut scratch = alloc::vec![0u8; request.block_size as usize];
    load_with_buffer(link, source, request, &mut scratch, progress)
}

/// [`save_with_buffer`] with an allocated scratch block
#[cfg(feature = "alloc")]
pub fn save<L, W, P>(
    link: &mut L,
    sink: &mut W,
    request: &TransferRequest,
    progress: &mut P,
) -> Result<TransferStats>
where
    L: Link + ?Sized,
    W: embedded_io::Write + ?Sized,
    P: TransferProgress + ?Sized,
{
    request.validate()?;
    let mut scratch = alloc::vec![0u8; request.block_size as usize];
    save_with_buffer(link, sink, request, &mut scratch, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::progress::NoProgress;
    use crate::testing::{image, RecordingLink};
    use std::vec::Vec;

    fn run_load(data: &[u8], request: &TransferRequest) -> (RecordingLink, Result<TransferStats>) {
        let mut link = RecordingLink::default();
        let mut source = data;
        let mut scratch = [0u8; 4096];
        let result =
            load_with_buffer(&mut link, &mut source, request, &mut scratch, &mut NoProgress);
        (link, result)
    }

    #[test]
    fn test_load_writes_exact_length_without_padding() {
        let data = image(2500);
        let request = TransferRequest::stream(0x40000, 0x200000);
        let (link, result) = run_load(&data, &request);

        let stats = result.unwrap();
        assert_eq!(stats.bytes, 2500);
        assert_eq!(stats.blocks, 3);
        assert_eq!(link.sessions.len(), 1);

        let session = &link.sessions[0];
        assert_eq!(session.frame(), &[0x00, 0x00, 0x04, 0x00, 0x00]);
        let sizes: Vec<usize> = session.payload_writes().iter().map(|w| w.len()).collect();
        assert_eq!(sizes, [1024, 1024, 452]);
        assert_eq!(session.payload(), data);
    }

    #[test]
    fn test_load_block_count_is_ceiling() {
        for (len, block, expected) in [(0, 1024, 0), (1024, 1024, 1), (1025, 1024, 2), (96, 32, 3)] {
            let data = image(len);
            let request = TransferRequest::stream(0, 0x10000).with_block_size(block);
            let (link, result) = run_load(&data, &request);
            assert_eq!(result.unwrap().blocks, expected, "len={} block={}", len, block);
            assert_eq!(link.sessions[0].payload_writes().len(), expected as usize);
        }
    }

    #[test]
    fn test_load_stops_at_max_length() {
        let data = image(5000);
        let request = TransferRequest::stream(0x4000, 1500);
        let (link, result) = run_load(&data, &request);

        assert_eq!(result.unwrap().bytes, 1500);
        assert_eq!(link.sessions[0].payload(), &data[..1500]);
    }

    #[test]
    fn test_load_error_still_closes_session() {
        let mut link = RecordingLink::default();
        link.fail_write_at = Some(2);
        let data = image(4096);
        let mut source = data.as_slice();
        let mut scratch = [0u8; 1024];
        let request = TransferRequest::stream(0, 0x10000);

        let result =
            load_with_buffer(&mut link, &mut source, &request, &mut scratch, &mut NoProgress);
        assert_eq!(result, Err(Error::TransferFailed));
        assert!(!link.selected);
        assert_eq!(link.sessions.len(), 1);
    }

    #[test]
    fn test_load_rejects_small_scratch() {
        let data = image(16);
        let mut source = data.as_slice();
        let mut scratch = [0u8; 8];
        let mut link = RecordingLink::default();
        let request = TransferRequest::stream(0, 16).with_block_size(16);

        let result =
            load_with_buffer(&mut link, &mut source, &request, &mut scratch, &mut NoProgress);
        assert_eq!(result, Err(Error::BufferTooSmall));
        assert!(link.sessions.is_empty());
    }

    #[test]
    fn test_save_reads_blocks_in_one_session() {
        let mut link = RecordingLink::default();
        let mut out = [0u8; 2048];
        let mut sink: &mut [u8] = &mut out;
        let mut scratch = [0u8; 1024];
        let request = TransferRequest::stream(0x16000, 2048);

        let stats =
            save_with_buffer(&mut link, &mut sink, &request, &mut scratch, &mut NoProgress)
                .unwrap();
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.bytes, 2048);
        assert_eq!(out[..4], [0, 1, 2, 3]);
        assert_eq!(out[1024], 0);

        assert_eq!(link.sessions.len(), 1);
        assert_eq!(link.sessions[0].frame(), &[0x01, 0x00, 0x01, 0x60, 0x00, 0x00]);
        assert_eq!(link.sessions[0].reads, [1024, 1024]);
    }

    #[test]
    fn test_save_caps_last_block() {
        let mut link = RecordingLink::default();
        let mut out = [0u8; 1100];
        let mut sink: &mut [u8] = &mut out;
        let mut scratch = [0u8; 1024];
        let request = TransferRequest::stream(0, 1100);

        save_with_buffer(&mut link, &mut sink, &request, &mut scratch, &mut NoProgress).unwrap();
        assert_eq!(link.sessions[0].reads, [1024, 76]);
        assert_eq!(out[1099], (1099 % 256) as u8);
    }
}
