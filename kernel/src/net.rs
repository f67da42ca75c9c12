//! NIC descriptor rings: the kernel-side half of a simple packet
//! transmit/receive contract. The actual NIC driver (interrupt handling,
//! DMA programming, link negotiation) lives outside this module; this
//! only owns the fixed-capacity ring buffers and the registered hook the
//! driver uses to actually kick the hardware.

use crate::error::{KernelError, KernelResult};
use spin::Mutex;

pub const MAX_PACKET: usize = 1536;
const RING_CAPACITY: usize = 64;

struct Ring {
    buffers: alloc::boxed::Box<[[u8; MAX_PACKET]]>,
    lens: alloc::boxed::Box<[usize]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl Ring {
    fn new() -> Self {
        Ring {
            buffers: alloc::vec![[0u8; MAX_PACKET]; RING_CAPACITY].into_boxed_slice(),
            lens: alloc::vec![0usize; RING_CAPACITY].into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn push(&mut self, data: &[u8]) -> KernelResult<()> {
        if self.count == RING_CAPACITY {
            return Err(KernelError::CblFull);
        }
        let len = data.len().min(MAX_PACKET);
        self.buffers[self.tail][..len].copy_from_slice(&data[..len]);
        self.lens[self.tail] = len;
        self.tail = (self.tail + 1) % RING_CAPACITY;
        self.count += 1;
        Ok(())
    }

    fn pop_into(&mut self, out: &mut [u8]) -> KernelResult<usize> {
        if self.count == 0 {
            return Err(KernelError::RfaEmpty);
        }
        let len = self.lens[self.head].min(out.len());
        out[..len].copy_from_slice(&self.buffers[self.head][..len]);
        self.head = (self.head + 1) % RING_CAPACITY;
        self.count -= 1;
        Ok(len)
    }
}

static TX_RING: Mutex<Option<Ring>> = Mutex::new(None);
static RX_RING: Mutex<Option<Ring>> = Mutex::new(None);

/// Registered by the NIC driver (external collaborator) at boot; called
/// once per queued packet so the driver can actually kick the hardware.
/// `None` until the driver installs a hook, in which case `xmit` just
/// queues the packet for later draining.
static KICK_TX: Mutex<Option<fn(&[u8])>> = Mutex::new(None);

pub fn init() {
    *TX_RING.lock() = Some(Ring::new());
    *RX_RING.lock() = Some(Ring::new());
}

pub fn install_driver_hook(kick: fn(&[u8])) {
    *KICK_TX.lock() = Some(kick);
}

/// **xmit(buf)**: queue a packet for transmission, failing `CBL_FULL` if
/// the ring has no room.
pub fn xmit(buf: &[u8]) -> KernelResult<()> {
    let mut ring = TX_RING.lock();
    let ring = ring.as_mut().expect("net::init not called");
    ring.push(buf)?;
    if let Some(kick) = *KICK_TX.lock() {
        kick(buf);
    }
    Ok(())
}

/// **recv(out)**: drain the oldest received packet into `out`, returning
/// its length, or `RFA_EMPTY` if none is queued.
pub fn recv(out: &mut [u8]) -> KernelResult<usize> {
    let mut ring = RX_RING.lock();
    let ring = ring.as_mut().expect("net::init not called");
    ring.pop_into(out)
}

/// Called by the NIC driver's interrupt handler when a packet arrives.
pub fn deliver(buf: &[u8]) -> KernelResult<()> {
    let mut ring = RX_RING.lock();
    let ring = ring.as_mut().expect("net::init not called");
    ring.push(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_reports_empty_before_any_push() {
        let mut ring = Ring::new();
        let mut out = [0u8; 16];
        assert_eq!(ring.pop_into(&mut out), Err(KernelError::RfaEmpty));
    }

    #[test]
    fn ring_round_trips_one_packet() {
        let mut ring = Ring::new();
        ring.push(&[1, 2, 3]).unwrap();
        let mut out = [0u8; 16];
        let len = ring.pop_into(&mut out).unwrap();
        assert_eq!(&out[..len], &[1, 2, 3]);
    }

    #[test]
    fn ring_reports_full_at_capacity() {
        let mut ring = Ring::new();
        for _ in 0..RING_CAPACITY {
            ring.push(&[0]).unwrap();
        }
        assert_eq!(ring.push(&[0]), Err(KernelError::CblFull));
    }
}
