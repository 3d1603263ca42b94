/// Size of the result block starting at `Register::ResultRangeStatus`.
pub const RESULT_BLOCK_LEN: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeStatus {
    Ok,
    HardwareFail,
    MinRangeFail,
    SynchronizationInt,
    OutOfBoundsFail,
    SignalFail,
    WrapTargetFail,
    XtalkSignalFail,
    RangeValidMinRangeClipped,
    RangeValidNoWrapCheckFail,
    Unknown,
}

impl RangeStatus {
    /// Maps the raw `range_status` byte; `stream_count` only matters for raw 9.
    pub fn from_raw(raw: u8, stream_count: u8) -> Self {
        match raw {
            1 | 2 | 3 | 17 => RangeStatus::HardwareFail,
            13 => RangeStatus::MinRangeFail,
            18 => RangeStatus::SynchronizationInt,
            5 => RangeStatus::OutOfBoundsFail,
            4 | 6 => RangeStatus::SignalFail,
            7 => RangeStatus::WrapTargetFail,
            12 => RangeStatus::XtalkSignalFail,
            8 => RangeStatus::RangeValidMinRangeClipped,
            9 if stream_count == 0 => RangeStatus::RangeValidNoWrapCheckFail,
            9 => RangeStatus::Ok,
            _ => RangeStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeStatus::Ok => "OK",
            RangeStatus::HardwareFail => "HardwareFail",
            RangeStatus::MinRangeFail => "MinRangeFail",
            RangeStatus::SynchronizationInt => "SynchronizationInt",
            RangeStatus::OutOfBoundsFail => "OutOfBoundsFail",
            RangeStatus::SignalFail => "SignalFail",
            RangeStatus::WrapTargetFail => "WrapTargetFail",
            RangeStatus::XtalkSignalFail => "XtalkSignalFail",
            RangeStatus::RangeValidMinRangeClipped => "RangeValidMinRangeClipped",
            RangeStatus::RangeValidNoWrapCheckFail => "RangeValidNoWrapCheckFail",
            RangeStatus::Unknown => "Unknown",
        }
    }

    /// True when the distance can be trusted.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            RangeStatus::Ok | RangeStatus::RangeValidMinRangeClipped | RangeStatus::RangeValidNoWrapCheckFail
        )
    }
}

impl core::fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remaining fields of the result block. Not needed to use a
/// measurement, but handy when tuning the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    pub report_status: u8,
    pub stream_count: u8,
    pub effective_spad_count: u16,
    pub peak_signal_rate: u16,
    pub ambient_rate: u16,
    pub sigma: u16,
    pub phase: u16,
    pub corrected_peak_signal_rate: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub distance_mm: u16,
    pub raw_status: u8,
    pub status: RangeStatus,
    pub diagnostics: Diagnostics,
}

pub fn decode(block: &[u8; RESULT_BLOCK_LEN]) -> Measurement {
    let word = |offset: usize| u16::from_be_bytes([block[offset], block[offset + 1]]);

    let raw_status = block[0];
    let diagnostics = Diagnostics {
        report_status: block[1],
        stream_count: block[2],
        effective_spad_count: word(3),
        peak_signal_rate: word(5),
        ambient_rate: word(7),
        sigma: word(9),
        phase: word(11),
        corrected_peak_signal_rate: word(15),
    };
    Measurement {
        distance_mm: word(13),
        raw_status,
        status: RangeStatus::from_raw(raw_status, diagnostics.stream_count),
        diagnostics,
    }
}
