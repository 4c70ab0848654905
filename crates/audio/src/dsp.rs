use crate::AudioError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakLevel {
    pub max: f32,
    pub min: f32,
}

impl PeakLevel {
    pub fn silence() -> Self {
        Self { max: 0.0, min: 0.0 }
    }

    pub fn measure(buffer: &[f32]) -> Self {
        let mut peak = Self::silence();
        for sample in buffer {
            peak.max = peak.max.max(*sample);
            peak.min = peak.min.min(*sample);
        }
        peak
    }

    pub fn exceeds_unity(&self) -> bool {
        self.max > 1.0 || self.min < -1.0
    }
}

/// Reject waveforms that cannot be written as a playable file.
pub fn validate_waveform(samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    if samples.is_empty() {
        return Err(AudioError::invalid("waveform has no samples"));
    }
    if sample_rate == 0 {
        return Err(AudioError::invalid("sample rate must be positive"));
    }
    if let Some(index) = samples.iter().position(|sample| !sample.is_finite()) {
        return Err(AudioError::invalid(format!(
            "sample {index} is not a finite number"
        )));
    }
    Ok(())
}

/// Convert float samples to 16-bit PCM, clamping to [-1, 1].
pub fn to_pcm16(buffer: &[f32]) -> Vec<i16> {
    buffer
        .iter()
        .map(|sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Average interleaved channels into a single channel.
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn peak_tracks_extremes() {
        let peak = PeakLevel::measure(&[0.5, -1.25, 0.75]);
        assert_relative_eq!(peak.max, 0.75);
        assert_relative_eq!(peak.min, -1.25);
        assert!(peak.exceeds_unity());
        assert!(!PeakLevel::measure(&[0.1, -0.1]).exceeds_unity());
    }

    #[test]
    fn validation_rejects_empty_and_zero_rate() {
        assert!(validate_waveform(&[], 16_000).is_err());
        assert!(validate_waveform(&[0.1], 0).is_err());
        assert!(validate_waveform(&[0.1, f32::NAN], 16_000).is_err());
        assert!(validate_waveform(&[0.0, 0.1, -0.1], 16_000).is_ok());
    }

    #[test]
    fn pcm16_conversion_clamps() {
        let pcm = to_pcm16(&[0.0, 1.0, -1.0, 1.5]);
        assert_eq!(pcm, vec![0, i16::MAX, -i16::MAX, i16::MAX]);
    }

    #[test]
    fn downmix_averages_frames() {
        let mono = downmix_to_mono(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.5);
        assert_relative_eq!(mono[1], 0.5);
        assert_eq!(downmix_to_mono(&[0.2, 0.3], 1), vec![0.2, 0.3]);
    }
}
