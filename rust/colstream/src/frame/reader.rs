use std::{borrow::Cow, sync::Arc};

use colstream_common::{Error, Result, try_or_ret_some_err};
use colstream_format::{
    FrameHeader, Schema, checksum,
    defs::{CHECKSUM_SIZE, FRAME_MARKER_SIZE, MAX_HEADER_SIZE, MESSAGE_LEN_SIZE},
    header::check_marker,
};
use colstream_io::ByteSource;

use crate::settings::ReaderOptions;

use super::{Frame, Segment};

/// Sequential frame reader over a [`ByteSource`].
///
/// The end of the stream is reported as `Ok(None)`. A frame returned by
/// [`next_frame`](Reader::next_frame) or
/// [`next_frame_aggregated`](Reader::next_frame_aggregated) borrows the reader
/// and stays valid until the next call.
pub struct Reader<'s> {
    source: ByteSource<'s>,
    options: ReaderOptions,
    /// Data sections of the frames in the current view.
    buffers: Vec<Vec<u8>>,
    /// A frame read ahead by aggregation and not yet returned.
    pending: Option<RawFrame>,
    /// Schema of the most recent frame, shared by subsequent frames with
    /// identical columns.
    schema: Option<Arc<Schema>>,
    frames_read: u64,
}

struct RawFrame {
    header: FrameHeader,
    data: Vec<u8>,
}

impl RawFrame {
    fn row_count(&self) -> usize {
        self.header.row_count as usize
    }
}

impl<'s> Reader<'s> {
    pub fn new(source: ByteSource<'s>) -> Reader<'s> {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: ByteSource<'s>, options: ReaderOptions) -> Reader<'s> {
        Reader {
            source,
            options,
            buffers: Vec::new(),
            pending: None,
            schema: None,
            frames_read: 0,
        }
    }

    pub fn from_slice(buf: &'s [u8]) -> Reader<'s> {
        Self::new(ByteSource::from_slice(buf))
    }

    /// Number of frames consumed from the source so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Reads the next frame.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        self.buffers.clear();
        let Some(raw) = self.take_frame()? else {
            return Ok(None);
        };
        Ok(Some(self.view(vec![raw])?))
    }

    /// Reads the next run of consecutive frames with an identical schema whose
    /// total row count does not exceed `max_rows`, as a single frame.
    ///
    /// At least one frame is always returned, whatever its size. A frame that
    /// changes the schema or would exceed the row ceiling is kept for the next
    /// call; neither condition is an error.
    pub fn next_frame_aggregated(&mut self, max_rows: usize) -> Result<Option<Frame<'_>>> {
        self.buffers.clear();
        let Some(first) = self.take_frame()? else {
            return Ok(None);
        };
        let mut total = first.row_count();
        let mut parts = vec![first];
        while total < max_rows {
            let Some(next) = self.take_frame()? else {
                break;
            };
            if next.header.columns != parts[0].header.columns {
                log::debug!("aggregation stopped at schema change after {total} rows");
                self.pending = Some(next);
                break;
            }
            if total + next.row_count() > max_rows {
                log::debug!(
                    "aggregation stopped at {total} rows, next frame has {} rows (ceiling {max_rows})",
                    next.row_count()
                );
                self.pending = Some(next);
                break;
            }
            total += next.row_count();
            parts.push(next);
        }
        log::debug!("aggregated {} frames, {total} rows", parts.len());
        Ok(Some(self.view(parts)?))
    }

    /// Reads the next frame as an owned frame, independent of the reader.
    pub fn next_owned_frame(&mut self) -> Result<Option<Frame<'static>>> {
        let Some(raw) = self.take_frame()? else {
            return Ok(None);
        };
        let schema = self.shared_schema(&raw.header)?;
        let RawFrame { header, data } = raw;
        let segment = Segment {
            row_start: 0,
            row_count: header.row_count as usize,
            chunks: header.chunks,
            data: Cow::Owned(data),
        };
        Ok(Some(Frame::new(
            schema,
            Arc::new(header.properties),
            vec![segment],
        )))
    }

    /// Iterates the remaining frames as owned frames.
    pub fn frames(self) -> FrameIter<'s> {
        FrameIter { reader: self }
    }

    fn view(&mut self, parts: Vec<RawFrame>) -> Result<Frame<'_>> {
        let schema = self.shared_schema(&parts[0].header)?;
        let mut headers = Vec::with_capacity(parts.len());
        for RawFrame { header, data } in parts {
            headers.push(header);
            self.buffers.push(data);
        }
        let mut properties = Vec::new();
        let mut row_start = 0;
        let mut segments = Vec::with_capacity(headers.len());
        for (i, (header, data)) in headers.into_iter().zip(&self.buffers).enumerate() {
            if i == 0 {
                properties = header.properties;
            }
            let row_count = header.row_count as usize;
            segments.push(Segment {
                row_start,
                row_count,
                chunks: header.chunks,
                data: Cow::Borrowed(data.as_slice()),
            });
            row_start += row_count;
        }
        Ok(Frame::new(schema, Arc::new(properties), segments))
    }

    fn shared_schema(&mut self, header: &FrameHeader) -> Result<Arc<Schema>> {
        if let Some(schema) = &self.schema {
            if schema.columns() == header.columns.as_slice() {
                return Ok(schema.clone());
            }
        }
        let schema = Schema::new(header.columns.clone())
            .map_err(|e| Error::invalid_format("frame schema", e.to_string()))?;
        let schema = Arc::new(schema);
        self.schema = Some(schema.clone());
        Ok(schema)
    }

    fn take_frame(&mut self) -> Result<Option<RawFrame>> {
        if let Some(raw) = self.pending.take() {
            return Ok(Some(raw));
        }
        self.read_frame()
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        let mut marker = [0u8; FRAME_MARKER_SIZE];
        let has_frame = self
            .source
            .read_exact_or_eof(&mut marker)
            .map_err(|e| self.read_error(e, "frame marker"))?;
        if !has_frame {
            log::debug!(
                "end of stream after {} frames ({})",
                self.frames_read,
                self.source.description()
            );
            return Ok(None);
        }
        check_marker(&marker)?;

        let mut len = [0u8; MESSAGE_LEN_SIZE];
        self.read_exact(&mut len, "frame header")?;
        let header_len = u32::from_le_bytes(len) as usize;
        if header_len > MAX_HEADER_SIZE {
            return Err(Error::invalid_format(
                "frame header",
                format!("declared size {header_len} exceeds {MAX_HEADER_SIZE}"),
            ));
        }
        let mut message = vec![0u8; MESSAGE_LEN_SIZE + header_len + CHECKSUM_SIZE];
        message[..MESSAGE_LEN_SIZE].copy_from_slice(&len);
        self.read_exact(&mut message[MESSAGE_LEN_SIZE..], "frame header")?;
        let payload = if self.options.verify_checksums {
            checksum::validate_message(&message)?
        } else {
            &message[MESSAGE_LEN_SIZE..MESSAGE_LEN_SIZE + header_len]
        };
        let header = FrameHeader::from_payload(payload)?;

        if header.data_size > self.options.max_frame_size {
            return Err(Error::invalid_format(
                "frame data",
                format!(
                    "{} bytes exceeds the {} byte limit",
                    header.data_size, self.options.max_frame_size
                ),
            ));
        }
        let mut data = vec![0u8; header.data_size as usize];
        self.read_exact(&mut data, "frame data")?;
        let mut checksum = [0u8; CHECKSUM_SIZE];
        self.read_exact(&mut checksum, "frame data checksum")?;
        if self.options.verify_checksums {
            checksum::validate_buffer(&data, u32::from_le_bytes(checksum), "frame data")?;
        }

        self.frames_read += 1;
        log::debug!(
            "read frame {}: {} rows, {} columns, {} data bytes",
            self.frames_read,
            header.row_count,
            header.columns.len(),
            header.data_size
        );
        Ok(Some(RawFrame { header, data }))
    }

    /// Fills `buf`; a stream ending inside a frame is a format error.
    fn read_exact(&mut self, buf: &mut [u8], element: &str) -> Result<()> {
        let complete = self
            .source
            .read_exact_or_eof(buf)
            .map_err(|e| self.read_error(e, element))?;
        if complete {
            Ok(())
        } else {
            Err(Error::invalid_format(element, "truncated frame"))
        }
    }

    fn read_error(&self, e: std::io::Error, element: &str) -> Error {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Error::invalid_format(element, format!("truncated frame: {e}"))
            }
            _ => Error::io(self.source.description(), e),
        }
    }
}

impl std::fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("source", &self.source.description())
            .field("frames_read", &self.frames_read)
            .field("pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

impl Reader<'static> {
    /// Opens the file at `path`.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Reader<'static>> {
        let path = path.as_ref();
        let source =
            ByteSource::open(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(Reader::new(source))
    }
}

/// Iterator over the owned frames of a [`Reader`].
pub struct FrameIter<'s> {
    reader: Reader<'s>,
}

impl FrameIter<'_> {
    pub fn frames_read(&self) -> u64 {
        self.reader.frames_read()
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Frame<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = try_or_ret_some_err!(self.reader.next_owned_frame());
        frame.map(Ok)
    }
}
