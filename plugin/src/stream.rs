//! Bounded buffer for live frames.

use common::models::frame::Frame;
use common::models::stream::StreamingFrameOptions;

/// Accumulates the packets of a live channel into one frame.
///
/// Rows are appended in arrival order and the oldest are evicted once the
/// frame holds more than `max_length`. A packet whose columns differ from the
/// buffered frame replaces it.
#[derive(Debug, Clone)]
pub struct LiveFrameBuffer {
    max_length: usize,
    frame: Option<Frame>,
}

impl LiveFrameBuffer {
    pub fn new(options: StreamingFrameOptions) -> Self {
        Self {
            max_length: options.max_length,
            frame: None,
        }
    }

    /// Starts from the snapshot a subscription returned.
    pub fn with_initial(options: StreamingFrameOptions, initial: Option<Frame>) -> Self {
        let mut buffer = Self::new(options);
        if let Some(frame) = initial {
            buffer.push(frame);
        }
        buffer
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn len(&self) -> usize {
        self.frame.as_ref().map_or(0, Frame::row_count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a packet, returning the buffered frame.
    pub fn push(&mut self, packet: Frame) -> Option<&Frame> {
        // Empty packets carry no columns to compare against.
        if packet.fields.is_empty() {
            return self.frame.as_ref();
        }
        match &mut self.frame {
            Some(frame) if frame.same_schema(&packet) => {
                for (field, incoming) in frame.fields.iter_mut().zip(packet.fields) {
                    field.values.extend(incoming.values);
                }
            }
            slot => {
                let mut packet = packet;
                if let Some(channel) = slot.as_ref().and_then(|f| f.channel()) {
                    if packet.channel().is_none() {
                        packet.set_channel(channel);
                    }
                }
                *slot = Some(packet);
            }
        }
        self.evict();
        self.frame.as_ref()
    }

    fn evict(&mut self) {
        let Some(frame) = &mut self.frame else {
            return;
        };
        let excess = frame.row_count().saturating_sub(self.max_length);
        if excess > 0 {
            for field in &mut frame.fields {
                field.values.drain(..excess.min(field.values.len()));
            }
        }
    }
}
