//! Frame demultiplexing and symbol range validation.
//!
//! A frame is seven consecutive symbols carrying one coarse timestep of the
//! three SNAC codebooks: one symbol for the coarsest level, two for the
//! middle level and four for the finest. The slots are interleaved, so the
//! mapping is kept in a single table.

use std::fmt;

use crate::FRAME_SIZE;

/// One of the three SNAC codebook levels, coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codebook {
    /// 1 symbol per frame
    A,
    /// 2 symbols per frame
    B,
    /// 4 symbols per frame
    C,
}

impl Codebook {
    pub const ALL: [Codebook; 3] = [Codebook::A, Codebook::B, Codebook::C];

    /// Symbols this codebook receives from every frame.
    pub const fn per_frame(self) -> usize {
        match self {
            Codebook::A => 1,
            Codebook::B => 2,
            Codebook::C => 4,
        }
    }

    const fn index(self) -> usize {
        match self {
            Codebook::A => 0,
            Codebook::B => 1,
            Codebook::C => 2,
        }
    }
}

impl fmt::Display for Codebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codebook::A => "A",
            Codebook::B => "B",
            Codebook::C => "C",
        };
        f.write_str(name)
    }
}

/// Frame slot → (codebook, position within that codebook's share of the frame).
pub const FRAME_LAYOUT: [(Codebook, usize); FRAME_SIZE] = [
    (Codebook::A, 0),
    (Codebook::B, 0),
    (Codebook::C, 0),
    (Codebook::C, 1),
    (Codebook::B, 1),
    (Codebook::C, 2),
    (Codebook::C, 3),
];

/// Demultiplexed but not yet validated symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frames {
    num_frames: usize,
    streams: [Vec<i64>; 3],
}

/// A symbol outside the codec's accepted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    pub codebook: Codebook,
    /// Index within the codebook stream
    pub index: usize,
    pub value: i64,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "symbol {} at codebook {}[{}] out of range",
            self.value, self.codebook, self.index
        )
    }
}

/// Validated codebook streams, laid out as the codec consumes them.
///
/// Owned copies: the codec never sees the caller's token buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodebookStreams {
    pub a: Vec<u32>,
    pub b: Vec<u32>,
    pub c: Vec<u32>,
}

impl CodebookStreams {
    /// Number of whole frames the streams were built from.
    pub fn num_frames(&self) -> usize {
        self.a.len()
    }

    pub fn get(&self, codebook: Codebook) -> &[u32] {
        match codebook {
            Codebook::A => &self.a,
            Codebook::B => &self.b,
            Codebook::C => &self.c,
        }
    }
}

/// Split the whole frames of `symbols` into the three codebook streams.
///
/// A trailing partial frame is ignored. Returns `None` when there is not a
/// single whole frame.
pub fn demux(symbols: &[i64]) -> Option<Frames> {
    let num_frames = symbols.len() / FRAME_SIZE;
    if num_frames == 0 {
        return None;
    }

    let mut streams = Codebook::ALL.map(|cb| vec![0i64; cb.per_frame() * num_frames]);
    for (frame_idx, frame) in symbols.chunks_exact(FRAME_SIZE).enumerate() {
        for (&symbol, &(codebook, slot)) in frame.iter().zip(FRAME_LAYOUT.iter()) {
            let pos = frame_idx * codebook.per_frame() + slot;
            streams[codebook.index()][pos] = symbol;
        }
    }

    Some(Frames {
        num_frames,
        streams,
    })
}

impl Frames {
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Raw symbols routed to `codebook`.
    pub fn stream(&self, codebook: Codebook) -> &[i64] {
        &self.streams[codebook.index()]
    }

    /// Check every symbol lies in `[0, max]` and convert to codec input.
    ///
    /// The first offending symbol (A, then B, then C) is reported; no
    /// partially converted streams are ever produced.
    pub fn validate(&self, max: u32) -> Result<CodebookStreams, OutOfRange> {
        let range = 0..=i64::from(max);
        for codebook in Codebook::ALL {
            if let Some((index, &value)) = self
                .stream(codebook)
                .iter()
                .enumerate()
                .find(|&(_, v)| !range.contains(v))
            {
                return Err(OutOfRange {
                    codebook,
                    index,
                    value,
                });
            }
        }

        let convert = |codebook| -> Vec<u32> {
            self.stream(codebook).iter().map(|&v| v as u32).collect()
        };
        Ok(CodebookStreams {
            a: convert(Codebook::A),
            b: convert(Codebook::B),
            c: convert(Codebook::C),
        })
    }
}
