//! Streaming receive pipeline: signal gating, multi-phase symbol
//! extraction, preamble search, header auto-detection and frame
//! collection, driven by successive `process_samples` calls.
//!
//! The receiver does not know the mode, the first symbol boundary or
//! the header FEC flavour in advance. It therefore runs one symbol
//! extractor per (mode, phase) candidate, searches every stream for a
//! preamble pattern, and locks mode and phase together on the first
//! match. Header decoding then tries both FEC encodings, falling back
//! to a fused decode of the redundant header copy before giving up and
//! returning to preamble search on the same buffered symbols.

use std::collections::HashSet;

use serde::Serialize;

use crate::bitpack;
use crate::buffer::SampleRing;
use crate::compress;
use crate::config::{
    AudioMode, DetectorTuning, ModeTable, DECODE_BUFFER_SECS, INTERLEAVE_DEPTH,
    MAX_HEADER_FAILURES, MIN_SAMPLES_PER_SYMBOL, NUM_PHASES,
};
use crate::crypto;
use crate::diagnostics::{
    DecodeProgress, DecodeResult, DecodeStats, NullObserver, ProgressObserver,
};
use crate::errors::{ConfigError, DecodeError, ModemError, Result};
use crate::fec::{self, FecMode};
use crate::framing::{self, FrameCollector, HeaderInfo, DATA_FRAME_OVERHEAD, HEADER_FRAME_LEN};
use crate::interleave::deinterleave;
use crate::logging::SignalLogger;
use crate::signal_processing::modulation::Modulator;
use crate::signal_processing::{calculate_signal_energy, ChirpDetector, SymbolDetector};

/// Receive state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderState {
    Idle,
    Listening,
    DetectingPreamble,
    ReceivingHeader,
    ReceivingData,
    Complete,
    Error,
}

/// Receive-side options.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    pub sample_rate: u32,
    /// Password for encrypted payloads; absent passwords defer
    /// decryption to `retry_with_password`.
    pub password: Option<String>,
    pub tuning: DetectorTuning,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            sample_rate: crate::config::DEFAULT_SAMPLE_RATE,
            password: None,
            tuning: DetectorTuning::default(),
        }
    }
}

/// One candidate symbol stream at a fixed boundary offset.
#[derive(Debug)]
struct PhaseStream {
    /// Absolute sample index of the next symbol window.
    next_boundary: u64,
    /// Symbols trimmed from the front; index `discarded` is the first
    /// entry of `symbols`.
    discarded: usize,
    symbols: Vec<u16>,
    /// Absolute symbol index where the next preamble scan resumes.
    search_from: usize,
}

impl PhaseStream {
    fn total_symbols(&self) -> usize {
        self.discarded + self.symbols.len()
    }

    fn slice(&self, start: usize, len: usize) -> Option<&[u16]> {
        let rel = start.checked_sub(self.discarded)?;
        self.symbols.get(rel..rel + len)
    }

    fn trim(&mut self) {
        if self.symbols.len() > 300 {
            let cut = self.symbols.len() - 200;
            self.symbols.drain(..cut);
            self.discarded += cut;
        }
        self.search_from = self.search_from.max(self.discarded);
    }

    fn reset_symbols(&mut self) {
        self.symbols.clear();
        self.discarded = 0;
        self.search_from = 0;
    }
}

/// Per-mode extraction bank: one detector, [`NUM_PHASES`] streams.
#[derive(Debug)]
struct ModeBank {
    mode: AudioMode,
    detector: SymbolDetector,
    symbol_samples: usize,
    phases: Vec<PhaseStream>,
}

impl ModeBank {
    fn new(mode: AudioMode, sample_rate: u32, tuning: DetectorTuning) -> Self {
        let symbol_samples = mode.table().symbol_samples(sample_rate);
        let phases = (0..NUM_PHASES)
            .map(|k| PhaseStream {
                next_boundary: (k * symbol_samples / NUM_PHASES) as u64,
                discarded: 0,
                symbols: Vec::new(),
                search_from: 0,
            })
            .collect();
        Self {
            mode,
            detector: SymbolDetector::new(mode, sample_rate, tuning),
            symbol_samples,
            phases,
        }
    }
}

/// Locked preamble match.
#[derive(Debug, Clone, Copy)]
struct SyncLock {
    bank: usize,
    phase: usize,
    /// Absolute symbol index immediately after the matched pattern.
    sync_found_at: usize,
}

#[derive(Debug)]
struct PendingPayload {
    payload: Vec<u8>,
    header: HeaderInfo,
}

/// Streaming decoder. Single threaded: each `process_samples` call
/// completes before the next may begin.
pub struct Decoder {
    options: DecoderOptions,
    state: DecoderState,
    ring: SampleRing,
    banks: Vec<ModeBank>,
    lock: Option<SyncLock>,
    header: Option<(HeaderInfo, FecMode)>,
    header_failures: u32,
    frames_attempted: HashSet<usize>,
    collector: FrameCollector,
    pending: Option<PendingPayload>,
    errors_fixed: usize,
    chirp: ChirpDetector,
    progress: DecodeProgress,
    observer: Box<dyn ProgressObserver>,
    logger: SignalLogger,
}

impl Decoder {
    pub fn new(options: DecoderOptions) -> Result<Self> {
        for mode in AudioMode::ALL {
            let samples = mode.table().symbol_samples(options.sample_rate);
            if samples < MIN_SAMPLES_PER_SYMBOL {
                return Err(ModemError::Config(ConfigError::SampleRateTooLow {
                    rate: options.sample_rate,
                    min: MIN_SAMPLES_PER_SYMBOL,
                }));
            }
        }

        let ring = SampleRing::new((options.sample_rate * DECODE_BUFFER_SECS) as usize);
        let banks = AudioMode::ALL
            .iter()
            .map(|&mode| ModeBank::new(mode, options.sample_rate, options.tuning))
            .collect();

        Ok(Self {
            options,
            state: DecoderState::Idle,
            ring,
            banks,
            lock: None,
            header: None,
            header_failures: 0,
            frames_attempted: HashSet::new(),
            collector: FrameCollector::new(),
            pending: None,
            errors_fixed: 0,
            chirp: ChirpDetector::new(),
            progress: DecodeProgress::default(),
            observer: Box::new(NullObserver),
            logger: SignalLogger::default(),
        })
    }

    pub fn set_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observer = observer;
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn progress(&self) -> &DecodeProgress {
        &self.progress
    }

    pub fn logger(&self) -> &SignalLogger {
        &self.logger
    }

    pub fn chirp_detected(&self) -> bool {
        self.chirp.detected()
    }

    /// Begin (or restart) a receive session.
    pub fn start(&mut self) {
        let sample_rate = self.options.sample_rate;
        let tuning = self.options.tuning;
        self.ring = SampleRing::new((sample_rate * DECODE_BUFFER_SECS) as usize);
        self.banks = AudioMode::ALL
            .iter()
            .map(|&mode| ModeBank::new(mode, sample_rate, tuning))
            .collect();
        self.lock = None;
        self.header = None;
        self.header_failures = 0;
        self.frames_attempted.clear();
        self.collector.clear();
        self.pending = None;
        self.errors_fixed = 0;
        self.chirp = ChirpDetector::new();
        self.progress = DecodeProgress::default();
        self.state = DecoderState::Listening;
        self.progress.state = self.state;
    }

    /// Stop listening; subsequent samples are ignored until `start`.
    pub fn stop(&mut self) {
        self.state = DecoderState::Idle;
        self.progress.state = self.state;
        self.notify();
    }

    /// Feed one block of PCM. Returns a completed decode when the last
    /// frame arrives; `Ok(None)` means more audio is needed or that the
    /// payload waits for a password.
    pub fn process_samples(&mut self, block: &[f32]) -> Result<Option<DecodeResult>> {
        match self.state {
            DecoderState::Idle | DecoderState::Complete | DecoderState::Error => {
                return Ok(None)
            }
            _ => {}
        }

        self.ring.push_slice(block);
        let was_detected = self.chirp.detected();
        self.chirp.feed(block, self.options.sample_rate);
        if !was_detected && self.chirp.detected() {
            self.logger.debug("CHIRP", "chirp signature detected");
        }

        let rms = calculate_signal_energy(block);
        self.progress.signal_level = (rms * 160.0).min(100.0);

        if self.state == DecoderState::Listening {
            if rms < self.options.tuning.energy_gate {
                self.notify();
                return Ok(None);
            }
            self.logger.info("SYNC", "signal energy above gate, searching for preamble");
            self.set_state(DecoderState::DetectingPreamble);
        }

        self.extract_symbols();

        if self.state == DecoderState::DetectingPreamble {
            self.search_preamble();
        }
        if self.state == DecoderState::ReceivingHeader {
            self.try_decode_header();
        }

        let mut result = None;
        if self.state == DecoderState::ReceivingData {
            self.decode_ready_frames();
            if self.collector.is_complete() {
                result = self.finalize()?;
            }
        }

        self.notify();
        Ok(result)
    }

    /// Re-run decryption and the rest of finalization with a new
    /// password. Independent of the sample stream; a wrong password
    /// leaves the decoder ready for another attempt.
    pub fn retry_with_password(&mut self, password: &str) -> Result<DecodeResult> {
        let result = self.process_pending(Some(password));
        match result {
            Ok(Some(decoded)) => {
                self.progress.needs_password = false;
                self.set_state(DecoderState::Complete);
                self.notify();
                Ok(decoded)
            }
            Ok(None) => Err(ModemError::Decode(DecodeError::NoPendingPayload)),
            Err(err) => Err(err),
        }
    }

    fn set_state(&mut self, state: DecoderState) {
        self.state = state;
        self.progress.state = state;
    }

    fn notify(&mut self) {
        self.progress.frames_received = self.collector.frames_received();
        self.progress.errors_corrected = self.errors_fixed;
        self.observer.update(&self.progress);
    }

    fn extract_symbols(&mut self) {
        let ring = &self.ring;
        for bank in &mut self.banks {
            let step = bank.symbol_samples as u64;
            for phase in &mut bank.phases {
                // Skip forward over evicted audio, preserving alignment.
                if phase.next_boundary < ring.start() {
                    let behind = ring.start() - phase.next_boundary;
                    phase.next_boundary += behind.div_ceil(step) * step;
                }
                while phase.next_boundary + step <= ring.end() {
                    let Some(window) = ring.window(phase.next_boundary, step as usize) else {
                        break;
                    };
                    let detection = bank.detector.detect(&window);
                    phase.symbols.push(detection.index);
                    phase.next_boundary += step;
                }
            }
        }
    }

    /// Three-tier pattern search over every candidate stream: the full
    /// calibration+sync pattern, the bare sync word, then a loose shape
    /// match. First hit locks mode and phase together.
    fn search_preamble(&mut self) {
        let mut found: Option<(SyncLock, f32, &'static str)> = None;

        'tiers: for tier in 0..3 {
            for (bank_index, bank) in self.banks.iter().enumerate() {
                let table = bank.mode.table();
                let tolerance = table.tone_tolerance;
                for (phase_index, phase) in bank.phases.iter().enumerate() {
                    let total = phase.total_symbols();
                    if total < 20 {
                        continue;
                    }
                    let first = phase.search_from.max(phase.discarded);

                    let hit = match tier {
                        0 => {
                            let mut pattern = Vec::with_capacity(16);
                            pattern.extend_from_slice(&table.calibration);
                            pattern.extend_from_slice(&table.calibration);
                            pattern.extend_from_slice(&table.sync_pattern);
                            Self::scan_pattern(phase, first, &pattern, tolerance, 15.0, 0)
                        }
                        1 => Self::scan_pattern(
                            phase,
                            first,
                            &table.sync_pattern,
                            tolerance,
                            6.0,
                            12,
                        ),
                        _ => Self::scan_loose(phase, first, table.tone_count),
                    };

                    if let Some((position, pattern_len, score)) = hit {
                        let tier_name = ["full", "sync", "loose"][tier];
                        found = Some((
                            SyncLock {
                                bank: bank_index,
                                phase: phase_index,
                                sync_found_at: position + pattern_len,
                            },
                            score / pattern_len as f32,
                            tier_name,
                        ));
                        break 'tiers;
                    }
                }
            }
        }

        if let Some((lock, confidence, tier_name)) = found {
            let mode = self.banks[lock.bank].mode;
            self.logger.info(
                "MODE",
                format!(
                    "preamble matched ({tier_name}) in {mode} mode, phase {}, symbol {}",
                    lock.phase, lock.sync_found_at
                ),
            );
            self.progress.sync_confidence = confidence;
            self.lock = Some(lock);
            self.set_state(DecoderState::ReceivingHeader);
        }
    }

    /// Linear scan for `pattern` with per-position tolerance: an exact
    /// index scores 1.0, an index within `tolerance` scores 0.5.
    /// `min_after` symbols must remain beyond the match.
    fn scan_pattern(
        phase: &PhaseStream,
        first: usize,
        pattern: &[u16],
        tolerance: u16,
        min_score: f32,
        min_after: usize,
    ) -> Option<(usize, usize, f32)> {
        let total = phase.total_symbols();
        let len = pattern.len();
        if total < len + min_after {
            return None;
        }
        for start in first..=total - len - min_after {
            let window = phase.slice(start, len)?;
            let mut score = 0.0f32;
            for (&symbol, &expected) in window.iter().zip(pattern) {
                if symbol == expected {
                    score += 1.0;
                } else if symbol.abs_diff(expected) <= tolerance {
                    score += 0.5;
                }
            }
            if score >= min_score {
                return Some((start, len, score));
            }
        }
        None
    }

    /// Loose shape match: four symbols roughly at [0, 1/4, 3/4, max] of
    /// the tone range followed by four strictly alternating low/high.
    fn scan_loose(
        phase: &PhaseStream,
        first: usize,
        tone_count: usize,
    ) -> Option<(usize, usize, f32)> {
        let total = phase.total_symbols();
        if total < 8 {
            return None;
        }
        let max = (tone_count - 1) as u16;
        let shape = [0, max / 4, max * 3 / 4, max];
        let mid = (tone_count / 2) as u16;
        let tolerance = (tone_count / 8).max(1) as u16;

        for start in first..=total - 8 {
            let window = phase.slice(start, 8)?;
            let shape_ok = window[..4]
                .iter()
                .zip(&shape)
                .all(|(&s, &e)| s.abs_diff(e) <= tolerance);
            let alternating = window[4..]
                .iter()
                .enumerate()
                .all(|(j, &s)| if j % 2 == 0 { s < mid } else { s >= mid });
            if shape_ok && alternating {
                return Some((start, 8, 4.0));
            }
        }
        None
    }

    /// Attempt both header encodings once enough symbols have arrived
    /// for the larger one; fuse in the redundant copy before declaring
    /// a failure.
    fn try_decode_header(&mut self) {
        let Some(lock) = self.lock else { return };
        let bank = &self.banks[lock.bank];
        let table = bank.mode.table();

        let sym_normal = table.symbols_for_bytes(fec::normal_len(HEADER_FRAME_LEN));
        let sym_robust = table.symbols_for_bytes(fec::robust_len(HEADER_FRAME_LEN));
        let needed = sym_normal.max(sym_robust);

        let phase = &bank.phases[lock.phase];
        let available = phase.total_symbols().saturating_sub(lock.sync_found_at);
        if available < needed {
            return;
        }

        // Single-copy path: normal first, then robust.
        let mut accepted = Self::attempt_header(table, phase, lock.sync_found_at, FecMode::Normal)
            .or_else(|| Self::attempt_header(table, phase, lock.sync_found_at, FecMode::Robust));

        if accepted.is_none() {
            // Redundant path: a multi-frame transmission repeats the
            // header, so retry on the second copy. Best-of-two by FEC
            // success; wait until the larger window could hold both.
            if available < 2 * needed {
                return;
            }
            accepted = Self::attempt_header(
                table,
                phase,
                lock.sync_found_at + sym_normal,
                FecMode::Normal,
            )
            .or_else(|| {
                Self::attempt_header(table, phase, lock.sync_found_at + sym_robust, FecMode::Robust)
            });
        }

        match accepted {
            Some((header, fec_mode, corrected)) => self.accept_header(header, fec_mode, corrected),
            None => self.header_failure(),
        }
    }

    fn attempt_header(
        table: &ModeTable,
        phase: &PhaseStream,
        start: usize,
        fec_mode: FecMode,
    ) -> Option<(HeaderInfo, FecMode, usize)> {
        let coded_len = match fec_mode {
            FecMode::Normal => fec::normal_len(HEADER_FRAME_LEN),
            FecMode::Robust => fec::robust_len(HEADER_FRAME_LEN),
        };
        let symbol_len = table.symbols_for_bytes(coded_len);
        let symbols = phase.slice(start, symbol_len)?;
        let bytes = bitpack::unpack_symbols(symbols, coded_len, table.bits_per_symbol);
        let deinterleaved = deinterleave(&bytes, INTERLEAVE_DEPTH);

        let decoded = match fec_mode {
            FecMode::Normal => fec::decode_normal(&deinterleaved, HEADER_FRAME_LEN),
            FecMode::Robust => fec::decode_robust(&deinterleaved, HEADER_FRAME_LEN),
        };
        let (frame, corrected) = decoded.ok()?;
        let header = framing::parse_header_frame(&frame)?;
        if !header.crc_valid {
            return None;
        }
        Some((header, fec_mode, corrected))
    }

    fn accept_header(&mut self, header: HeaderInfo, fec_mode: FecMode, corrected: usize) {
        self.errors_fixed += corrected;
        self.progress.frames_expected = header.total_frames();
        self.logger.info(
            "HEADER",
            format!(
                "header accepted: session {:#06x}, {} bytes in {} frames ({:?} FEC, {} corrected)",
                header.session_id,
                header.payload_length,
                header.total_frames(),
                fec_mode,
                corrected
            ),
        );
        if let Err(err) = self.collector.set_header(header.clone()) {
            self.logger.warn("SESSION", format!("header rejected: {err}"));
            self.header_failure();
            return;
        }
        self.header = Some((header, fec_mode));
        self.header_failures = 0;
        self.set_state(DecoderState::ReceivingData);
    }

    fn header_failure(&mut self) {
        self.header_failures += 1;
        self.logger.debug(
            "HEADER",
            format!("header decode failed ({} consecutive)", self.header_failures),
        );
        if self.header_failures >= MAX_HEADER_FAILURES {
            self.progress.signal_warning = true;
            self.progress.debug =
                Some("poor signal: repeated header decode failures".to_string());
            self.logger.warn("HEADER", "poor signal: repeated header decode failures");
        }

        // Resume the search after the pattern that led us astray.
        if let Some(lock) = self.lock.take() {
            let phase = &mut self.banks[lock.bank].phases[lock.phase];
            phase.search_from = phase.search_from.max(lock.sync_found_at);
        }
        for bank in &mut self.banks {
            for phase in &mut bank.phases {
                phase.trim();
            }
        }
        self.set_state(DecoderState::DetectingPreamble);
    }

    /// Symbol offsets of every data frame relative to the locked sync
    /// position.
    fn frame_layout(&self) -> Option<(SyncLock, Vec<(usize, usize, usize)>)> {
        let lock = self.lock?;
        let (header, fec_mode) = self.header.as_ref()?;
        let table = self.banks[lock.bank].mode.table();

        let coded_header = match fec_mode {
            FecMode::Normal => fec::normal_len(HEADER_FRAME_LEN),
            FecMode::Robust => fec::robust_len(HEADER_FRAME_LEN),
        };
        let copies = Modulator::header_copies(header.total_frames());
        let mut offset = lock.sync_found_at + copies * table.symbols_for_bytes(coded_header);

        let mut layout = Vec::with_capacity(header.total_frames());
        for index in 0..header.total_frames() {
            let frame_len = header.payload_size_for(index) + DATA_FRAME_OVERHEAD;
            let coded_len = fec::robust_len(frame_len);
            layout.push((offset, coded_len, frame_len));
            offset += table.symbols_for_bytes(coded_len);
        }
        Some((lock, layout))
    }

    fn decode_ready_frames(&mut self) {
        let Some((lock, layout)) = self.frame_layout() else {
            return;
        };
        let Some((header, _)) = self.header.clone() else {
            return;
        };
        let bank = &self.banks[lock.bank];
        let bits = bank.mode.table().bits_per_symbol;
        let phase = &bank.phases[lock.phase];

        // Gather decodable frames first; the collector and counters are
        // updated afterwards to keep the borrows disjoint.
        let mut ready: Vec<(usize, Vec<u8>, usize)> = Vec::new();
        for (index, &(offset, coded_len, frame_len)) in layout.iter().enumerate() {
            if self.frames_attempted.contains(&index) {
                continue;
            }
            let symbols_needed = bank.mode.table().symbols_for_bytes(coded_len);
            let Some(symbols) = phase.slice(offset, symbols_needed) else {
                continue;
            };
            let bytes = bitpack::unpack_symbols(symbols, coded_len, bits);
            let deinterleaved = deinterleave(&bytes, INTERLEAVE_DEPTH);
            ready.push((index, deinterleaved, frame_len));
        }

        for (index, coded, frame_len) in ready {
            self.frames_attempted.insert(index);
            match fec::decode_robust(&coded, frame_len) {
                Ok((frame, corrected)) => match framing::parse_data_frame(&frame) {
                    Some(data_frame) if data_frame.crc_valid => {
                        match self.collector.add_frame(
                            data_frame.frame_index,
                            data_frame.payload,
                            header.session_id,
                        ) {
                            Ok(true) => {
                                self.errors_fixed += corrected;
                                self.logger.debug(
                                    "FRAME",
                                    format!(
                                        "frame {} decoded ({corrected} corrected)",
                                        data_frame.frame_index
                                    ),
                                );
                            }
                            Ok(false) => {
                                self.logger
                                    .debug("FRAME", format!("frame {index} duplicate, dropped"));
                            }
                            Err(err) => {
                                self.logger.warn("SESSION", format!("frame {index} dropped: {err}"));
                            }
                        }
                    }
                    _ => {
                        self.logger
                            .debug("FRAME", format!("frame {index} failed CRC or parse"));
                    }
                },
                Err(err) => {
                    self.logger
                        .debug("FEC", format!("frame {index} unrecoverable: {err}"));
                }
            }
        }
    }

    fn finalize(&mut self) -> Result<Option<DecodeResult>> {
        let payload = match self.collector.reassemble() {
            Ok(payload) => payload,
            Err(err) => {
                self.logger.warn("FRAME", format!("reassembly failed: {err}"));
                self.soft_reset();
                return Ok(None);
            }
        };
        let Some((header, _)) = self.header.clone() else {
            self.soft_reset();
            return Ok(None);
        };

        // Keep the raw payload so a corrected password can finish the
        // job without any more audio.
        self.pending = Some(PendingPayload { payload, header });

        let password = self.options.password.clone();
        match self.process_pending(password.as_deref()) {
            Ok(Some(result)) => {
                self.set_state(DecoderState::Complete);
                Ok(Some(result))
            }
            Ok(None) => {
                self.progress.needs_password = true;
                self.logger.info("CRYPTO", "payload is encrypted and needs a password");
                self.set_state(DecoderState::Complete);
                Ok(None)
            }
            Err(ModemError::Decode(err)) if err.recoverable() => {
                self.logger.warn("FRAME", format!("finalize failed, resetting: {err}"));
                self.soft_reset();
                Ok(None)
            }
            Err(err) => {
                if matches!(err, ModemError::Decode(DecodeError::DecryptionFailed)) {
                    // The supplied password was wrong; reception itself
                    // succeeded, so allow retries.
                    self.progress.needs_password = true;
                    self.set_state(DecoderState::Complete);
                } else {
                    self.set_state(DecoderState::Error);
                }
                self.notify();
                Err(err)
            }
        }
    }

    /// Decrypt, decompress and checksum the pending payload. `Ok(None)`
    /// means a password is required but none was supplied.
    fn process_pending(&mut self, password: Option<&str>) -> Result<Option<DecodeResult>> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(ModemError::Decode(DecodeError::NoPendingPayload))?;
        let header = pending.header.clone();
        let mut data = pending.payload.clone();

        if header.encrypted {
            let Some(password) = password else {
                return Ok(None);
            };
            data = crypto::decrypt(&data, password).map_err(ModemError::Decode)?;
        }
        if header.compressed {
            data = compress::decompress(&data, header.algo, header.original_length)
                .map_err(ModemError::Decode)?;
        }

        if data.len() < header.original_length {
            return Err(ModemError::Decode(DecodeError::LengthMismatch {
                expected: header.original_length,
                actual: data.len(),
            }));
        }
        data.truncate(header.original_length);

        let checksum = crypto::sha256_hex(&data);
        Ok(Some(DecodeResult {
            text: String::from_utf8(data.clone()).ok(),
            bytes: data,
            checksum,
            encrypted: header.encrypted,
            stats: DecodeStats {
                frame_count: header.total_frames(),
                errors_fixed: self.errors_fixed,
                compressed: header.compressed,
                encrypted: header.encrypted,
            },
        }))
    }

    /// Recoverable receive failure: drop collected frames and buffered
    /// symbols, keep listening on the same audio stream.
    fn soft_reset(&mut self) {
        self.logger.info("SYNC", "soft reset, returning to preamble search");
        self.collector.clear();
        self.frames_attempted.clear();
        self.header = None;
        self.lock = None;
        self.pending = None;
        for bank in &mut self.banks {
            for phase in &mut bank.phases {
                phase.reset_symbols();
            }
        }
        self.progress.frames_expected = 0;
        self.progress.sync_confidence = 0.0;
        self.progress.needs_password = false;
        self.set_state(DecoderState::DetectingPreamble);
    }
}
