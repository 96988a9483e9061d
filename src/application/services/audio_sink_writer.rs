//! Audio Sink Writer - 出站音频流的串行写入
//!
//! 语音和文件播放共用同一个出站流。sink 的获取与完整的“写入 + flush”
//! 处于同一个临界区内，任意时刻只有一个写入者。

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::error::RelayError;
use crate::application::ports::{AudioTranscoderPort, PcmStream};
use crate::application::services::SessionHandle;
use crate::domain::audio::{PcmBuffer, PcmFormat};

/// 默认出站缓冲区大小（128 KiB）
pub const DEFAULT_SINK_BUFFER_BYTES: usize = 128 * 1024;
/// 默认单次写入大小: 20ms 线路格式音频
pub const DEFAULT_FRAME_BYTES: usize = 3840;

/// Sink 配置
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// 出站流缓冲区大小（字节）
    pub buffer_bytes: usize,
    /// 单次写入的字节数，按帧对齐
    pub frame_bytes: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: DEFAULT_SINK_BUFFER_BYTES,
            frame_bytes: DEFAULT_FRAME_BYTES,
        }
    }
}

/// 绑定到某个会话的出站流
struct AudioSink {
    session_id: Uuid,
    stream: PcmStream,
    bytes_written: u64,
    created_at: DateTime<Utc>,
}

/// 出站音频写入器
pub struct AudioSinkWriter {
    transcoder: Arc<dyn AudioTranscoderPort>,
    config: SinkConfig,
    /// 互斥门：持有者独占 sink 的创建、写入与关闭
    gate: Mutex<Option<AudioSink>>,
}

impl AudioSinkWriter {
    pub fn new(transcoder: Arc<dyn AudioTranscoderPort>, config: SinkConfig) -> Self {
        let align = PcmFormat::WIRE.block_align();
        let frame_bytes = (config.frame_bytes.max(align) / align) * align;
        Self {
            transcoder,
            config: SinkConfig {
                buffer_bytes: config.buffer_bytes,
                frame_bytes,
            },
            gate: Mutex::new(None),
        }
    }

    /// 确保当前会话已有出站流
    pub async fn ensure_sink(&self, session: &SessionHandle) -> Result<(), RelayError> {
        let mut slot = self.gate.lock().await;
        Self::acquire(&mut *slot, session, self.config.buffer_bytes).await?;
        Ok(())
    }

    /// 写入一段合成语音，返回写入的字节数
    pub async fn write_speech(
        &self,
        session: &SessionHandle,
        buffer: PcmBuffer,
    ) -> Result<u64, RelayError> {
        let pcm = self
            .transcoder
            .to_wire_format(buffer)
            .map_err(|e| RelayError::SynthesisError(format!("Cannot convert speech audio: {}", e)))?;
        self.write_wire(session, pcm).await
    }

    /// 播放音频文件，返回写入的字节数
    ///
    /// 文件在进入临界区之前完成读取与解码，失败时 sink 不受影响
    pub async fn write_file(&self, session: &SessionHandle, path: &Path) -> Result<u64, RelayError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| RelayError::decode(format!("{}: {}", path.display(), e)))?;

        let extension = path.extension().and_then(|e| e.to_str());
        let pcm = self
            .transcoder
            .decode_to_wire_format(&data, extension)
            .map_err(|e| RelayError::decode(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            path = %path.display(),
            file_size = data.len(),
            duration_ms = pcm.duration_ms(),
            "Audio file decoded"
        );

        self.write_wire(session, pcm).await
    }

    /// 关闭并释放当前出站流
    ///
    /// 有写入正在进行时不等待，返回 false；该写入被断开连接中止，
    /// 或在 flush 后发现会话已断开时自行释放 sink
    pub async fn close(&self) -> bool {
        let Ok(mut slot) = self.gate.try_lock() else {
            return false;
        };

        if let Some(mut sink) = slot.take() {
            if let Err(e) = sink.stream.flush().await {
                tracing::debug!(error = %e, "Flush before close failed");
            }
            if let Err(e) = sink.stream.shutdown().await {
                tracing::debug!(error = %e, "Stream shutdown failed");
            }
            tracing::info!(
                session_id = %sink.session_id,
                bytes_written = sink.bytes_written,
                opened_secs = (Utc::now() - sink.created_at).num_seconds(),
                "Audio sink closed"
            );
        }
        true
    }

    /// 是否已创建出站流
    pub async fn has_sink(&self) -> bool {
        self.gate.lock().await.is_some()
    }

    /// 临界区：获取 sink，完整写入并 flush
    async fn write_wire(&self, session: &SessionHandle, pcm: PcmBuffer) -> Result<u64, RelayError> {
        let mut slot = self.gate.lock().await;
        let started = Instant::now();
        let len = pcm.len() as u64;

        let outcome = {
            let sink = Self::acquire(&mut *slot, session, self.config.buffer_bytes).await?;
            match write_frames(&mut sink.stream, session, pcm.data(), self.config.frame_bytes).await {
                Ok(()) => {
                    sink.bytes_written += len;
                    Ok(len)
                }
                Err(e) => Err(e),
            }
        };

        match outcome {
            Ok(written) => {
                // 写入期间会话已被拆除，close 没能拿到互斥门，由这里释放
                if !session.is_connected() {
                    if let Some(mut sink) = slot.take() {
                        let _ = sink.stream.shutdown().await;
                        tracing::info!(
                            session_id = %sink.session_id,
                            bytes_written = sink.bytes_written,
                            "Audio sink released after disconnect"
                        );
                    }
                }
                tracing::debug!(
                    session_id = %session.id(),
                    bytes = written,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Audio written to sink"
                );
                Ok(written)
            }
            Err(e) => {
                // 流已失效，下次写入重新创建
                slot.take();
                tracing::warn!(session_id = %session.id(), error = %e, "Audio sink write failed");
                Err(RelayError::stream_write(e.to_string()))
            }
        }
    }

    async fn acquire<'a>(
        slot: &'a mut Option<AudioSink>,
        session: &SessionHandle,
        buffer_bytes: usize,
    ) -> Result<&'a mut AudioSink, RelayError> {
        let stale = matches!(slot.as_ref(), Some(sink) if sink.session_id != session.id());
        if stale {
            if let Some(mut old) = slot.take() {
                let _ = old.stream.shutdown().await;
                tracing::debug!(session_id = %old.session_id, "Dropped sink of previous session");
            }
        }

        if slot.is_none() {
            if !session.is_connected() {
                return Err(RelayError::NotConnected);
            }
            let stream = session.connection().create_pcm_stream(buffer_bytes).await?;
            tracing::info!(
                session_id = %session.id(),
                buffer_bytes = buffer_bytes,
                "Audio sink created"
            );
            *slot = Some(AudioSink {
                session_id: session.id(),
                stream,
                bytes_written: 0,
                created_at: Utc::now(),
            });
        }

        slot.as_mut().ok_or(RelayError::NotConnected)
    }
}

async fn write_frames(
    stream: &mut PcmStream,
    session: &SessionHandle,
    data: &[u8],
    frame_bytes: usize,
) -> std::io::Result<()> {
    for frame in data.chunks(frame_bytes) {
        if !session.is_connected() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "voice connection closed",
            ));
        }
        stream.write_all(frame).await?;
    }
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::task::{Context, Poll};
    use tokio::io::AsyncWrite;
    use tokio_util::sync::CancellationToken;

    use crate::application::ports::{PlatformError, VoiceConnectionPort};
    use crate::domain::audio::SampleEncoding;
    use crate::domain::session::{ChannelRef, ConnectionState, VoiceSession};
    use crate::infrastructure::adapters::PcmConverter;

    /// flush 在放行前一直挂起
    #[derive(Default)]
    struct FlushGate {
        reached: AtomicBool,
        released: AtomicBool,
    }

    /// 每次写入前让出一次调度，暴露潜在的交错
    struct RecordingStream {
        captured: Arc<StdMutex<Vec<u8>>>,
        closed: CancellationToken,
        flush_gate: Option<Arc<FlushGate>>,
        yield_next: bool,
    }

    impl AsyncWrite for RecordingStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.closed.is_cancelled() {
                return Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()));
            }
            if self.yield_next {
                self.yield_next = false;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            self.yield_next = true;
            self.captured.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            if let Some(gate) = &self.flush_gate {
                gate.reached.store(true, Ordering::SeqCst);
                if !gate.released.load(Ordering::SeqCst) {
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
            }
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct RecordingConnection {
        captured: Arc<StdMutex<Vec<u8>>>,
        closed: CancellationToken,
        flush_gate: Option<Arc<FlushGate>>,
        streams: StdMutex<usize>,
    }

    impl RecordingConnection {
        fn new() -> Self {
            Self {
                captured: Arc::new(StdMutex::new(Vec::new())),
                closed: CancellationToken::new(),
                flush_gate: None,
                streams: StdMutex::new(0),
            }
        }

        fn with_flush_gate(gate: Arc<FlushGate>) -> Self {
            Self {
                flush_gate: Some(gate),
                ..Self::new()
            }
        }

        fn captured(&self) -> Vec<u8> {
            self.captured.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VoiceConnectionPort for RecordingConnection {
        fn channel_id(&self) -> u64 {
            7
        }

        fn state(&self) -> ConnectionState {
            if self.closed.is_cancelled() {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Connected
            }
        }

        async fn create_pcm_stream(&self, _buffer_size: usize) -> Result<PcmStream, PlatformError> {
            if self.closed.is_cancelled() {
                return Err(PlatformError::NotConnected);
            }
            *self.streams.lock().unwrap() += 1;
            Ok(Box::new(RecordingStream {
                captured: self.captured.clone(),
                closed: self.closed.clone(),
                flush_gate: self.flush_gate.clone(),
                yield_next: false,
            }))
        }

        async fn disconnect(&self) -> Result<(), PlatformError> {
            self.closed.cancel();
            Ok(())
        }
    }

    fn session(connection: Arc<RecordingConnection>) -> SessionHandle {
        let mut session = VoiceSession::connecting(ChannelRef {
            guild_id: 1,
            guild_name: "Eorzea".to_string(),
            channel_id: 7,
            channel_name: "Raid".to_string(),
        });
        session.mark_connected();
        SessionHandle::new(session, connection)
    }

    fn writer() -> AudioSinkWriter {
        AudioSinkWriter::new(
            Arc::new(PcmConverter::new()),
            SinkConfig {
                buffer_bytes: DEFAULT_SINK_BUFFER_BYTES,
                frame_bytes: 64,
            },
        )
    }

    fn tone(value: i16, frames: usize) -> PcmBuffer {
        PcmBuffer::from_wire_samples(&vec![value; frames * 2])
    }

    #[tokio::test]
    async fn test_sink_is_created_lazily() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let writer = writer();

        assert!(!writer.has_sink().await);
        writer.ensure_sink(&session).await.unwrap();
        writer.ensure_sink(&session).await.unwrap();
        assert!(writer.has_sink().await);
        assert_eq!(*connection.streams.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_speech_passes_wire_audio_through() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let writer = writer();

        let written = writer.write_speech(&session, tone(0x0101, 100)).await.unwrap();
        assert_eq!(written, 400);
        assert_eq!(connection.captured(), vec![0x01u8; 400]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_do_not_interleave() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let writer = Arc::new(writer());

        let mut tasks = Vec::new();
        for value in [0x0101i16, 0x0202, 0x0303, 0x0404] {
            let writer = writer.clone();
            let session = session.clone();
            tasks.push(tokio::spawn(async move {
                writer.write_speech(&session, tone(value, 500)).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 2000);
        }

        let captured = connection.captured();
        assert_eq!(captured.len(), 8000);

        // 每个写入者的字节必须是连续的一段
        let mut runs = Vec::new();
        for byte in captured {
            if runs.last() != Some(&byte) {
                runs.push(byte);
            }
        }
        assert_eq!(runs.len(), 4, "writes interleaved: {:?}", runs);
    }

    #[tokio::test]
    async fn test_write_without_connection_fails() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        connection.disconnect().await.unwrap();

        let result = writer().write_speech(&session, tone(1, 10)).await;
        assert!(matches!(result, Err(RelayError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_during_write_is_an_error() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let writer = Arc::new(writer());

        let task = {
            let writer = writer.clone();
            let session = session.clone();
            tokio::spawn(async move { writer.write_speech(&session, tone(5, 48_000)).await })
        };

        // 等待写入开始后断开
        while connection.captured().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(!writer.close().await);
        connection.disconnect().await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(RelayError::StreamWriteError(_))));
        assert!(!writer.has_sink().await);
    }

    #[tokio::test]
    async fn test_disconnect_during_flush_releases_sink() {
        let gate = Arc::new(FlushGate::default());
        let connection = Arc::new(RecordingConnection::with_flush_gate(gate.clone()));
        let session = session(connection.clone());
        let writer = Arc::new(writer());

        let task = {
            let writer = writer.clone();
            let session = session.clone();
            tokio::spawn(async move { writer.write_speech(&session, tone(3, 100)).await })
        };

        // 所有帧已写完，卡在 flush 上
        while !gate.reached.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        assert!(!writer.close().await);
        connection.disconnect().await.unwrap();
        gate.released.store(true, Ordering::SeqCst);

        assert_eq!(task.await.unwrap().unwrap(), 400);
        assert!(!writer.has_sink().await);
    }

    #[tokio::test]
    async fn test_missing_file_leaves_sink_untouched() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let writer = writer();
        writer.write_speech(&session, tone(9, 10)).await.unwrap();

        let result = writer
            .write_file(&session, Path::new("/nonexistent/ready-check.wav"))
            .await;
        assert!(matches!(result, Err(RelayError::AudioDecodeError(_))));
        assert!(writer.has_sink().await);
        assert_eq!(connection.captured().len(), 40);
    }

    #[tokio::test]
    async fn test_undecodable_file_is_rejected() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF....WAVEjunk").unwrap();

        let result = writer().write_file(&session, &path).await;
        assert!(matches!(result, Err(RelayError::AudioDecodeError(_))));
        assert!(connection.captured().is_empty());
    }

    #[tokio::test]
    async fn test_write_file_converts_to_wire_format() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chime.wav");
        std::fs::write(&path, crate::domain::audio::test_support::sine_wav(24_000, 24_000)).unwrap();

        let written = writer().write_file(&session, &path).await.unwrap();

        // 1 秒单声道 24 kHz -> 1 秒立体声 48 kHz
        let expected = PcmFormat::WIRE.byte_rate();
        assert!(written.abs_diff(expected) <= 16, "written {} bytes", written);
        assert_eq!(connection.captured().len() as u64, written);
    }

    #[tokio::test]
    async fn test_speech_in_other_format_is_converted() {
        let connection = Arc::new(RecordingConnection::new());
        let session = session(connection.clone());
        let format = PcmFormat::new(16_000, 1, SampleEncoding::I16);
        let buffer = PcmBuffer::new(format, vec![0u8; 3200]).unwrap();

        let written = writer().write_speech(&session, buffer).await.unwrap();
        // 100ms -> 48000 * 0.1 帧 * 4 字节
        assert_eq!(written, 19_200);
    }

    #[tokio::test]
    async fn test_sink_of_previous_session_is_replaced() {
        let first_conn = Arc::new(RecordingConnection::new());
        let second_conn = Arc::new(RecordingConnection::new());
        let writer = writer();

        writer.write_speech(&session(first_conn.clone()), tone(1, 4)).await.unwrap();
        writer.write_speech(&session(second_conn.clone()), tone(2, 4)).await.unwrap();

        assert_eq!(first_conn.captured().len(), 16);
        assert_eq!(second_conn.captured(), vec![0x02u8, 0x00].repeat(8));
    }
}
