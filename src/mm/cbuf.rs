//! Chained payload buffers
//!
//! Message payloads are staged in chains of fixed-size heap blocks rather
//! than one contiguous allocation, so a 64 KiB message never needs a 64 KiB
//! contiguous region of kernel heap. A `CBuf` exclusively owns its chain;
//! moving the value is the ownership transfer the queue protocol relies on
//! (producer → queue slot → consumer or teardown), and dropping it frees
//! every block.

use crate::config::CBUF_BLOCK_SIZE;
use crate::mm::usercopy::{self, UserCopyResult, UserPtr};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// An owned chain of payload blocks holding exactly `len` bytes
pub struct CBuf {
    blocks: Vec<Box<[u8; CBUF_BLOCK_SIZE]>>,
    len: usize,
}

impl CBuf {
    /// Allocate a chain holding `len` zeroed bytes
    ///
    /// Returns `None` when the chain bookkeeping cannot be allocated.
    pub fn new(len: usize) -> Option<CBuf> {
        let nblocks = len.div_ceil(CBUF_BLOCK_SIZE);

        let mut blocks = Vec::new();
        if blocks.try_reserve_exact(nblocks).is_err() {
            return None;
        }
        for _ in 0..nblocks {
            blocks.push(Box::new([0u8; CBUF_BLOCK_SIZE]));
        }

        Some(CBuf { blocks, len })
    }

    /// Number of payload bytes in the chain
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chain holds no payload
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_span(&self, off: usize, n: usize) {
        assert!(
            off.checked_add(n).is_some_and(|end| end <= self.len),
            "cbuf span {}+{} outside chain of {}",
            off,
            n,
            self.len
        );
    }

    /// Copy `src` into the chain at byte offset `off`
    pub fn copy_from_kernel(&mut self, off: usize, src: &[u8]) {
        self.check_span(off, src.len());

        let mut done = 0;
        while done < src.len() {
            let pos = off + done;
            let block = pos / CBUF_BLOCK_SIZE;
            let start = pos % CBUF_BLOCK_SIZE;
            let take = (CBUF_BLOCK_SIZE - start).min(src.len() - done);
            self.blocks[block][start..start + take].copy_from_slice(&src[done..done + take]);
            done += take;
        }
    }

    /// Copy `dst.len()` bytes out of the chain starting at byte offset `off`
    pub fn copy_to_kernel(&self, off: usize, dst: &mut [u8]) {
        self.check_span(off, dst.len());

        let mut done = 0;
        while done < dst.len() {
            let pos = off + done;
            let block = pos / CBUF_BLOCK_SIZE;
            let start = pos % CBUF_BLOCK_SIZE;
            let take = (CBUF_BLOCK_SIZE - start).min(dst.len() - done);
            dst[done..done + take].copy_from_slice(&self.blocks[block][start..start + take]);
            done += take;
        }
    }

    /// Copy `n` bytes in from user memory at byte offset `off`
    ///
    /// # Safety
    ///
    /// Same contract as [`usercopy::copy_from_user`].
    pub unsafe fn copy_from_user(
        &mut self,
        off: usize,
        src: UserPtr,
        n: usize,
    ) -> UserCopyResult<()> {
        self.check_span(off, n);
        usercopy::check_user_range(src, n)?;

        let mut done = 0;
        while done < n {
            let pos = off + done;
            let block = pos / CBUF_BLOCK_SIZE;
            let start = pos % CBUF_BLOCK_SIZE;
            let take = (CBUF_BLOCK_SIZE - start).min(n - done);
            unsafe {
                usercopy::copy_from_user(
                    &mut self.blocks[block][start..start + take],
                    src.byte_add(done),
                )?;
            }
            done += take;
        }
        Ok(())
    }

    /// Copy `n` bytes out to user memory from byte offset `off`
    ///
    /// # Safety
    ///
    /// Same contract as [`usercopy::copy_to_user`].
    pub unsafe fn copy_to_user(&self, off: usize, dst: UserPtr, n: usize) -> UserCopyResult<()> {
        self.check_span(off, n);
        usercopy::check_user_range(dst, n)?;

        let mut done = 0;
        while done < n {
            let pos = off + done;
            let block = pos / CBUF_BLOCK_SIZE;
            let start = pos % CBUF_BLOCK_SIZE;
            let take = (CBUF_BLOCK_SIZE - start).min(n - done);
            unsafe {
                usercopy::copy_to_user(
                    dst.byte_add(done),
                    &self.blocks[block][start..start + take],
                )?;
            }
            done += take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_chain() {
        let buf = CBuf::new(0).unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        buf.copy_to_kernel(0, &mut []);
    }

    #[test]
    fn single_block_round_trip() {
        let mut buf = CBuf::new(16).unwrap();
        buf.copy_from_kernel(0, b"abcdabcdabcdabcd");

        let mut out = [0u8; 16];
        buf.copy_to_kernel(0, &mut out);
        assert_eq!(&out, b"abcdabcdabcdabcd");
    }

    #[test]
    fn multi_block_round_trip() {
        // Three blocks plus a tail
        let len = CBUF_BLOCK_SIZE * 3 + 77;
        let src: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        let mut buf = CBuf::new(len).unwrap();
        buf.copy_from_kernel(0, &src);

        let mut out = alloc::vec![0u8; len];
        buf.copy_to_kernel(0, &mut out);
        assert_eq!(out, src);
    }

    #[test]
    fn offset_copies_cross_block_seams() {
        let len = CBUF_BLOCK_SIZE * 2;
        let mut buf = CBuf::new(len).unwrap();

        let off = CBUF_BLOCK_SIZE - 3;
        buf.copy_from_kernel(off, b"straddle");

        let mut out = [0u8; 8];
        buf.copy_to_kernel(off, &mut out);
        assert_eq!(&out, b"straddle");
    }

    #[test]
    #[should_panic]
    fn span_past_end_is_rejected() {
        let mut buf = CBuf::new(8).unwrap();
        buf.copy_from_kernel(4, b"toolong");
    }

    #[test]
    fn user_copies_through_chain() {
        let mut staging = [0u8; 40];
        let uptr = UserPtr::new(staging.as_mut_ptr() as usize);
        unsafe {
            usercopy::copy_to_user(uptr, b"0123456789012345678901234567890123456789").unwrap();
        }

        let mut buf = CBuf::new(40).unwrap();
        unsafe {
            buf.copy_from_user(0, uptr, 40).unwrap();
        }

        let mut out = [0u8; 40];
        let optr = UserPtr::new(out.as_mut_ptr() as usize);
        unsafe {
            buf.copy_to_user(0, optr, 40).unwrap();
        }
        assert_eq!(out, staging);
    }
}
