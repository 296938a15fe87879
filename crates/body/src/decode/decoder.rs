use super::{BoxBody, ContentDecoder, Writer};
use crate::error::BoxError;
use brotli::enc::StandardAlloc;
use brotli::{BrotliDecompressStream, BrotliResult, BrotliState};
use bytes::{Buf, Bytes};
use flate2::write::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use http_body::{Body, Frame};
use http_body_util::BodyExt;
use pin_project_lite::pin_project;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::trace;
use zstd::stream::raw::{Decoder as ZstdDecoder, InBuffer, Operation, OutBuffer};

/// Upper bound of a single decoded data frame.
const CHUNK_SIZE: usize = 32 * 1024;

/// The content codings this crate can decode out of the box.
///
/// Every codec is a [`ContentDecoder`], so it can be registered in
/// [`Decoders`](super::Decoders) under any token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Gzip container, `Content-Encoding: gzip`.
    Gzip,
    /// Zlib container, `Content-Encoding: deflate`.
    Deflate,
    /// Brotli, `Content-Encoding: br`.
    Br,
    /// Zstandard, `Content-Encoding: zstd`.
    Zstd,
}

impl Codec {
    /// The content-encoding token this codec is registered under by default.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
            Codec::Br => "br",
            Codec::Zstd => "zstd",
        }
    }
}

impl ContentDecoder for Codec {
    fn decode(&self, body: BoxBody) -> BoxBody {
        DecodedBody::new(body, *self).boxed_unsync()
    }
}

type BrotliDecoder = BrotliState<StandardAlloc, StandardAlloc, StandardAlloc>;

/// Decompression state, driven one bounded step at a time.
enum Decompressor {
    Gzip { decoder: GzDecoder<Writer>, done: bool },
    Deflate { decoder: Decompress, done: bool },
    // `hint` is 0 once a frame is complete and flushed
    Zstd { decoder: ZstdDecoder<'static>, hint: usize },
    Br { decoder: Box<BrotliDecoder>, done: bool },
}

impl Decompressor {
    fn new(codec: Codec) -> io::Result<Self> {
        let decompressor = match codec {
            Codec::Gzip => Self::Gzip { decoder: GzDecoder::new(Writer::new()), done: false },
            Codec::Deflate => Self::Deflate { decoder: Decompress::new(true), done: false },
            Codec::Zstd => Self::Zstd { decoder: ZstdDecoder::new()?, hint: 1 },
            Codec::Br => Self::Br {
                decoder: Box::new(BrotliState::new(
                    StandardAlloc::default(),
                    StandardAlloc::default(),
                    StandardAlloc::default(),
                )),
                done: false,
            },
        };
        Ok(decompressor)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Gzip { .. } => "gzip",
            Self::Deflate { .. } => "deflate",
            Self::Zstd { .. } => "zstd",
            Self::Br { .. } => "br",
        }
    }

    /// Decodes from the front of `input`, advancing it past what was consumed.
    ///
    /// Returns at most [`CHUNK_SIZE`] bytes. An empty result with an empty
    /// `input` means more input is needed. Bytes following the end of the
    /// compressed stream are dropped.
    fn decode(&mut self, input: &mut Bytes) -> io::Result<Bytes> {
        match self {
            Self::Gzip { decoder, done } => {
                if !decoder.get_ref().is_empty() {
                    return Ok(decoder.get_mut().take(CHUNK_SIZE));
                }

                if *done {
                    input.clear();
                }
                // an empty write moves output held back by the decoder into the writer
                let n = decoder.write(&input[..])?;
                if n == 0 && !input.is_empty() {
                    *done = true;
                    input.clear();
                } else {
                    input.advance(n);
                }
                Ok(decoder.get_mut().take(CHUNK_SIZE))
            }
            Self::Deflate { decoder, done } => {
                if *done {
                    input.clear();
                    return Ok(Bytes::new());
                }

                let mut output = Vec::with_capacity(CHUNK_SIZE);
                let before = decoder.total_in();
                let status = decoder
                    .decompress_vec(&input[..], &mut output, FlushDecompress::None)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                input.advance((decoder.total_in() - before) as usize);

                *done = status == Status::StreamEnd;
                Ok(Bytes::from(output))
            }
            Self::Zstd { decoder, hint } => {
                let mut output = Vec::with_capacity(CHUNK_SIZE);
                let (consumed, next) = {
                    let mut src = InBuffer::around(&input[..]);
                    let mut dst = OutBuffer::around(&mut output);
                    let next = decoder.run(&mut src, &mut dst)?;
                    (src.pos(), next)
                };
                // an idle call past the end of a frame asks for the next frame header
                if consumed > 0 || !output.is_empty() {
                    *hint = next;
                }
                input.advance(consumed);
                Ok(Bytes::from(output))
            }
            Self::Br { decoder, done } => {
                if *done {
                    input.clear();
                    return Ok(Bytes::new());
                }

                let mut output = vec![0; CHUNK_SIZE];
                let mut available_in = input.len();
                let mut input_offset = 0;
                let mut available_out = output.len();
                let mut output_offset = 0;
                let mut total_out = 0;
                let result = BrotliDecompressStream(
                    &mut available_in,
                    &mut input_offset,
                    &input[..],
                    &mut available_out,
                    &mut output_offset,
                    &mut output,
                    &mut total_out,
                    &mut **decoder,
                );
                input.advance(input_offset);
                output.truncate(output_offset);

                match result {
                    BrotliResult::ResultFailure => {
                        Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt brotli stream"))
                    }
                    BrotliResult::ResultSuccess => {
                        *done = true;
                        Ok(Bytes::from(output))
                    }
                    BrotliResult::NeedsMoreInput | BrotliResult::NeedsMoreOutput => Ok(Bytes::from(output)),
                }
            }
        }
    }

    /// Checks the compressed stream was complete, returning whatever the
    /// decompressor still held.
    fn finish(self) -> io::Result<Bytes> {
        let complete = match self {
            Self::Gzip { decoder, .. } => return decoder.finish().map(|writer| writer.buf.freeze()),
            Self::Deflate { done, .. } | Self::Br { done, .. } => done,
            Self::Zstd { hint, .. } => hint == 0,
        };

        if complete {
            Ok(Bytes::new())
        } else {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file"))
        }
    }
}

pin_project! {
    /// A wrapper around a body that decompresses its data frames.
    ///
    /// Each inbound frame is decoded in steps of at most [`CHUNK_SIZE`]
    /// output bytes, the input not yet consumed waits in `input`. The
    /// decompressor is dropped once the inner body ends or fails, after that
    /// the body only yields `None`.
    struct DecodedBody {
        #[pin]
        inner: BoxBody,
        decompressor: Option<Decompressor>,
        input: Bytes,
        eof: bool,
        error: Option<io::Error>,
    }
}

impl DecodedBody {
    fn new(inner: BoxBody, codec: Codec) -> Self {
        let (decompressor, error) = match Decompressor::new(codec) {
            Ok(decompressor) => (Some(decompressor), None),
            Err(e) => (None, Some(e)),
        };
        Self { inner, decompressor, input: Bytes::new(), eof: false, error }
    }
}

impl Body for DecodedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        if let Some(e) = this.error.take() {
            return Poll::Ready(Some(Err(e.into())));
        }

        loop {
            let Some(decompressor) = this.decompressor.as_mut() else {
                return Poll::Ready(None);
            };

            let remaining = this.input.len();
            let bytes = match decompressor.decode(this.input) {
                Ok(bytes) => bytes,
                Err(e) => {
                    trace!("error decoding {} encoding: {}", decompressor.name(), e);
                    this.decompressor.take();
                    return Poll::Ready(Some(Err(e.into())));
                }
            };

            if !bytes.is_empty() {
                trace!(consumed = remaining - this.input.len(), decoded = bytes.len(), "decoded chunk");
                return Poll::Ready(Some(Ok(Frame::data(bytes))));
            }

            if !this.input.is_empty() {
                if this.input.len() == remaining {
                    this.decompressor.take();
                    let e = io::Error::new(io::ErrorKind::InvalidData, "decoder made no progress");
                    return Poll::Ready(Some(Err(e.into())));
                }
                continue;
            }

            if *this.eof {
                // the decompressor is only finished once
                let Some(decompressor) = this.decompressor.take() else {
                    return Poll::Ready(None);
                };

                return match decompressor.finish() {
                    Ok(bytes) if bytes.is_empty() => Poll::Ready(None),
                    Ok(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                    Err(e) => {
                        trace!("incomplete compressed body: {}", e);
                        Poll::Ready(Some(Err(e.into())))
                    }
                };
            }

            match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => *this.input = data,
                    // trailers are not compressed
                    Err(frame) => return Poll::Ready(Some(Ok(frame))),
                },
                Some(Err(e)) => {
                    this.decompressor.take();
                    return Poll::Ready(Some(Err(e)));
                }
                None => *this.eof = true,
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.error.is_none() && self.decompressor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::boxed;
    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use http_body_util::{Full, StreamBody};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut encoder = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
        encoder.write_all(data).unwrap();
        encoder.into_inner()
    }

    fn zstd(data: &[u8]) -> Vec<u8> {
        zstd::stream::encode_all(data, 3).unwrap()
    }

    fn compress(codec: Codec, data: &[u8]) -> Vec<u8> {
        match codec {
            Codec::Gzip => gzip(data),
            Codec::Deflate => zlib(data),
            Codec::Br => brotli(data),
            Codec::Zstd => zstd(data),
        }
    }

    fn full(data: Vec<u8>) -> BoxBody {
        boxed(Full::new(Bytes::from(data)))
    }

    /// Splits `data` into frames of `size` bytes.
    fn chunked(data: Vec<u8>, size: usize) -> BoxBody {
        let chunks: Vec<Result<_, io::Error>> =
            data.chunks(size).map(|chunk| Ok(Frame::data(Bytes::copy_from_slice(chunk)))).collect();
        boxed(StreamBody::new(futures::stream::iter(chunks)))
    }

    async fn decode_all(codec: Codec, body: BoxBody) -> Result<Bytes, BoxError> {
        codec.decode(body).collect().await.map(|collected| collected.to_bytes())
    }

    fn error_kind(err: &BoxError) -> Option<io::ErrorKind> {
        err.downcast_ref::<io::Error>().map(io::Error::kind)
    }

    #[tokio::test]
    async fn test_gzip() {
        let body = full(gzip(b"hello world"));
        assert_eq!(decode_all(Codec::Gzip, body).await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_deflate() {
        let body = full(zlib(b"hello world"));
        assert_eq!(decode_all(Codec::Deflate, body).await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_brotli() {
        let body = full(brotli(b"hello world"));
        assert_eq!(decode_all(Codec::Br, body).await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_zstd() {
        let body = full(zstd(b"hello world"));
        assert_eq!(decode_all(Codec::Zstd, body).await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_split_frames() {
        let text = "lorem ipsum dolor sit amet ".repeat(200);
        for codec in [Codec::Gzip, Codec::Deflate, Codec::Br, Codec::Zstd] {
            let body = chunked(compress(codec, text.as_bytes()), 7);
            assert_eq!(decode_all(codec, body).await.unwrap(), Bytes::from(text.clone()), "codec: {codec:?}");
        }
    }

    #[tokio::test]
    async fn test_invalid_gzip() {
        let body = full(b"definitely not gzip".to_vec());
        assert!(decode_all(Codec::Gzip, body).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_deflate() {
        let body = full(b"definitely not zlib".to_vec());
        let err = decode_all(Codec::Deflate, body).await.unwrap_err();
        assert_eq!(error_kind(&err), Some(io::ErrorKind::InvalidData));
    }

    #[tokio::test]
    async fn test_truncated_streams_fail() {
        let text = b"hello world, hello world, hello world";
        for codec in [Codec::Gzip, Codec::Deflate, Codec::Br, Codec::Zstd] {
            let mut compressed = compress(codec, text);
            compressed.truncate(compressed.len() - 6);
            assert!(decode_all(codec, full(compressed)).await.is_err(), "codec: {codec:?}");
        }
    }

    #[tokio::test]
    async fn test_truncated_deflate_is_unexpected_eof() {
        let mut compressed = zlib(b"hello world, hello world, hello world");
        compressed.truncate(compressed.len() - 6);

        let err = decode_all(Codec::Deflate, full(compressed)).await.unwrap_err();
        assert_eq!(error_kind(&err), Some(io::ErrorKind::UnexpectedEof));
        assert_eq!(err.to_string(), "unexpected end of file");
    }

    #[tokio::test]
    async fn test_truncated_zstd_is_unexpected_eof() {
        let mut compressed = zstd(b"hello world, hello world, hello world");
        compressed.truncate(compressed.len() - 6);

        let err = decode_all(Codec::Zstd, full(compressed)).await.unwrap_err();
        assert_eq!(error_kind(&err), Some(io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_empty_body_is_incomplete() {
        for codec in [Codec::Gzip, Codec::Deflate, Codec::Br, Codec::Zstd] {
            assert!(decode_all(codec, full(Vec::new())).await.is_err(), "codec: {codec:?}");
        }
    }

    #[tokio::test]
    async fn test_trailing_bytes_are_dropped() {
        let mut compressed = zlib(b"hello world");
        compressed.extend_from_slice(b"trailing");
        assert_eq!(decode_all(Codec::Deflate, full(compressed)).await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_frames_are_bounded() {
        let zeros = vec![0; 4 * 1024 * 1024];
        for codec in [Codec::Gzip, Codec::Deflate, Codec::Br, Codec::Zstd] {
            let mut body = codec.decode(full(compress(codec, &zeros)));

            let mut total = 0;
            while let Some(frame) = body.frame().await {
                let data = frame.unwrap().into_data().unwrap();
                assert!(data.len() <= CHUNK_SIZE, "codec: {codec:?}, frame: {}", data.len());
                total += data.len();
            }
            assert_eq!(total, zeros.len(), "codec: {codec:?}");
        }
    }

    #[tokio::test]
    async fn test_bomb_is_read_lazily() {
        let mut body = Codec::Gzip.decode(full(gzip(&vec![0; 16 * 1024 * 1024])));

        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert!(!first.is_empty());
        assert!(first.len() <= CHUNK_SIZE);
        assert!(!body.is_end_stream());
    }

    #[tokio::test]
    async fn test_inner_error_propagates() {
        let chunks: Vec<Result<Frame<Bytes>, io::Error>> =
            vec![Ok(Frame::data(Bytes::from(gzip(b"hello")))), Err(io::Error::other("connection reset"))];
        let body = boxed(StreamBody::new(futures::stream::iter(chunks)));

        let err = decode_all(Codec::Gzip, body).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[tokio::test]
    async fn test_end_stream() {
        let mut body = Codec::Gzip.decode(full(gzip(b"abc")));
        assert!(!body.is_end_stream());

        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap(), Bytes::from("abc"));
        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[test]
    fn test_names() {
        assert_eq!(Codec::Gzip.name(), "gzip");
        assert_eq!(Codec::Deflate.name(), "deflate");
        assert_eq!(Codec::Br.name(), "br");
        assert_eq!(Codec::Zstd.name(), "zstd");
    }
}
