//! Tight GROM packing
//!
//! GROM images are often distributed "tight": consecutive 6 KiB units with
//! no padding. On the device every unit occupies its own 8 KiB slot, so
//! unit `k` of the source lands at `base + 0x2000 * k`. Each slot is written
//! in its own session.

use super::{drain_block, fill_block, flush_sink, TransferRequest, TransferStats};
use crate::error::{Error, Result};
use crate::frame::ControlFrame;
use crate::link::{with_session, Link};
use crate::progress::TransferProgress;

/// Payload bytes per GROM unit
pub const SLOT_PAYLOAD: u32 = 6144;
/// Distance between consecutive GROM slots on the device
pub const SLOT_STRIDE: u32 = 0x2000;
/// Default upper bound on tight-packed payload
pub const DEFAULT_TIGHT_MAX_LEN: u32 = 0x80000;

/// Number of slots needed for `len` payload bytes
pub fn slot_count(len: u32) -> u32 {
    len.div_ceil(SLOT_PAYLOAD)
}

/// Device address of slot `index`
pub fn slot_address(base: u32, index: u32) -> Result<u32> {
    index
        .checked_mul(SLOT_STRIDE)
        .and_then(|offset| base.checked_add(offset))
        .ok_or(Error::LengthExceedsBound)
}

/// Check that every slot needed for `max_length` bytes fits below 4 GiB
pub fn check_span(base: u32, max_length: u32) -> Result<()> {
    let slots = u64::from(slot_count(max_length));
    let end = u64::from(base) + slots * u64::from(SLOT_STRIDE);
    if end > u64::from(u32::MAX) + 1 {
        log::error!(
            "tight: {} bytes from 0x{:08X} overflow the address space",
            max_length,
            base
        );
        return Err(Error::LengthExceedsBound);
    }
    Ok(())
}

/// Outcome of filling a single slot
struct SlotFill {
    bytes: usize,
    blocks: u32,
    exhausted: bool,
}

/// Pack 6 KiB units of `source` into 8 KiB device slots
///
/// For each slot the first block is read before the device is selected, so
/// a source that ends exactly on a unit boundary opens no further session.
/// A slot that receives fewer than 6144 bytes ends the whole operation
/// after its session closes. At most `max_length` source bytes are
/// consumed.
///
/// `scratch` must hold at least `block_size` bytes.
pub fn load_tight_with_buffer<L, R, P>(
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
    check_span(request.base_address, request.max_length)?;

    let limit = request.max_length as usize;
    let slot_payload = SLOT_PAYLOAD as usize;

    log::debug!(
        "tight: load to 0x{:08X} (max {} bytes, {} slots)",
        request.base_address,
        limit,
        slot_count(request.max_length)
    );
    progress.started(request.mode, request.max_length);

    let mut stats = TransferStats::default();
    let mut consumed = 0usize;
    let mut index = 0u32;

    while consumed < limit {
        let quota = slot_payload.min(limit - consumed);
        let first_want = block_size.min(quota);
        let first = fill_block(source, &mut block[..first_want])?;
        if first == 0 {
            log::debug!("tight: source exhausted at slot {}", index);
            break;
        }

        let address = slot_address(request.base_address, index)?;
        progress.slot_started(index, address);

        let fill = with_session(link, |session| {
            session.send_frame(&ControlFrame::load(address))?;
            session.write(&block[..first])?;

            let mut fill = SlotFill {
                bytes: first,
                blocks: 1,
                exhausted: first < first_want,
            };
            while !fill.exhausted && fill.bytes < quota {
                let want = block_size.min(quota - fill.bytes);
                let got = fill_block(source, &mut block[..want])?;
                if got == 0 {
                    fill.exhausted = true;
                    break;
                }
                session.write(&block[..got])?;
                fill.bytes += got;
                fill.blocks += 1;
                fill.exhausted = got < want;
            }
            Ok(fill)
        })?;

        consumed += fill.bytes;
        stats.sessions += 1;
        stats.blocks += fill.blocks;
        progress.advanced(consumed as u32);
        log::trace!(
            "tight: slot {} at 0x{:08X} took {} bytes",
            index,
            address,
            fill.bytes
        );

        if fill.exhausted && fill.bytes < slot_payload {
            log::debug!(
                "tight: slot {} partially filled ({} bytes), stopping",
                index,
                fill.bytes
            );
            break;
        }
        index += 1;
    }
    stats.bytes = consumed as u32;

    log::info!(
        "Packed {} bytes into {} GROM slots from 0x{:08X}",
        stats.bytes,
        stats.sessions,
        request.base_address
    );
    progress.finished(&stats);
    Ok(stats)
}

/// Read tight-packed units back out of 8 KiB device slots
///
/// The inverse of [`load_tight_with_buffer`]: reads 6144 bytes from each
/// slot, one session per slot, until `max_length` bytes have been appended
/// to `sink`.
///
/// `scratch` must hold at least `block_size` bytes.
pub fn save_tight_with_buffer<L, W, P>(
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
    check_span(request.base_address, request.max_length)?;

    let length = request.max_length as usize;
    progress.started(request.mode, request.max_length);

    let mut stats = TransferStats::default();
    let mut produced = 0usize;
    let mut index = 0u32;

    while produced < length {
        let quota = (SLOT_PAYLOAD as usize).min(length - produced);
        let address = slot_address(request.base_address, index)?;
        progress.slot_started(index, address);

        let blocks = with_session(link, |session| {
            session.send_frame(&ControlFrame::save(address))?;
            let mut blocks = 0u32;
            let mut taken = 0usize;
            while taken < quota {
                let chunk = block_size.min(quota - taken);
                session.read(&mut block[..chunk])?;
                drain_block(sink, &block[..chunk])?;
                taken += chunk;
                blocks += 1;
            }
            Ok(blocks)
        })?;

        produced += quota;
        stats.sessions += 1;
        stats.blocks += blocks;
        progress.advanced(produced as u32);
        index += 1;
    }
    stats.bytes = produced as u32;
    flush_sink(sink)?;

    log::info!(
        "Unpacked {} bytes from {} GROM slots at 0x{:08X}",
        stats.bytes,
        stats.sessions,
        request.base_address
    );
    progress.finished(&stats);
    Ok(stats)
}

/// [`load_tight_with_buffer`] with an allocated scratch block
#[cfg(feature = "alloc")]
pub fn load_tight<L, R, P>(
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
    load_tight_with_buffer(link, source, request, &mut scratch, progress)
}

/// [`save_tight_with_buffer`] with an allocated scratch block
#[cfg(feature = "alloc")]
pub fn save_tight<L, W, P>(
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
    save_tight_with_buffer(link, sink, request, &mut scratch, progress)
}
