//! Vowel-image dataset.
//!
//! Images are decoded, converted to RGB, resized to 48×48 and every channel is
//! scaled to [0, 1]. The feature vector is all red values, then all green, then
//! all blue (row-major within each channel).
//!
//! Normalised samples are stored one per line as
//! `R[r, ...]+G[g, ...]+B[b, ...]:[1, 0, 0, 0, 0]`, where the label is the
//! one-hot vowel in A, E, I, O, U order.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::data::Dataset;
use crate::error::{NetError, Result};
use crate::math::matrix::argmax;
use crate::network::network::Network;

/// Side length images are resized to.
pub const IMAGE_SIZE: u32 = 48;
/// Feature count of a normalised image (three channels).
pub const FEATURE_COUNT: usize = (IMAGE_SIZE * IMAGE_SIZE * 3) as usize;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vowel {
    A,
    E,
    I,
    O,
    U,
}

impl Vowel {
    pub const ALL: [Vowel; 5] = [Vowel::A, Vowel::E, Vowel::I, Vowel::O, Vowel::U];

    /// Vowel for a file-name initial, case-insensitive.
    pub fn from_char(c: char) -> Option<Vowel> {
        match c.to_ascii_uppercase() {
            'A' => Some(Vowel::A),
            'E' => Some(Vowel::E),
            'I' => Some(Vowel::I),
            'O' => Some(Vowel::O),
            'U' => Some(Vowel::U),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(i: usize) -> Option<Vowel> {
        Vowel::ALL.get(i).copied()
    }

    /// One-hot target vector.
    pub fn one_hot(&self) -> Vec<f64> {
        let mut v = vec![0.0; Vowel::ALL.len()];
        v[self.index()] = 1.0;
        v
    }

    pub fn labels() -> Vec<String> {
        Vowel::ALL.iter().map(|v| v.to_string()).collect()
    }
}

impl fmt::Display for Vowel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Vowel::A => 'A',
            Vowel::E => 'E',
            Vowel::I => 'I',
            Vowel::O => 'O',
            Vowel::U => 'U',
        };
        write!(f, "{}", c)
    }
}

/// Per-channel pixel values in [0, 1], each `IMAGE_SIZE²` long.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub red: Vec<f64>,
    pub green: Vec<f64>,
    pub blue: Vec<f64>,
}

impl NormalizedImage {
    /// R values, then G, then B.
    pub fn features(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.red.len() * 3);
        v.extend_from_slice(&self.red);
        v.extend_from_slice(&self.green);
        v.extend_from_slice(&self.blue);
        v
    }

    pub fn color_balance(&self) -> ColorBalance {
        dominant_color(&self.red, &self.green, &self.blue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Blue,
}

/// Share of each channel in the total intensity, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBalance {
    pub dominant: Color,
    pub red_pct: f64,
    pub green_pct: f64,
    pub blue_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VowelSample {
    pub vowel: Vowel,
    pub image: NormalizedImage,
}

/// Network verdict for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct VowelPrediction {
    pub vowel: Vowel,
    /// Output activation of every vowel, times 100.
    pub activations: Vec<(Vowel, f64)>,
}

impl VowelPrediction {
    pub fn confidence(&self) -> f64 {
        self.activations[self.vowel.index()].1
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

pub fn normalize_image(path: impl AsRef<Path>) -> Result<NormalizedImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| NetError::Image { path: path.to_path_buf(), source })?;
    Ok(normalize_dynamic(&img))
}

fn normalize_dynamic(img: &image::DynamicImage) -> NormalizedImage {
    let resized = img.resize_exact(IMAGE_SIZE, IMAGE_SIZE, image::imageops::FilterType::CatmullRom);
    let rgb = resized.to_rgb8();

    let pixels = (IMAGE_SIZE * IMAGE_SIZE) as usize;
    let mut out = NormalizedImage {
        red: Vec::with_capacity(pixels),
        green: Vec::with_capacity(pixels),
        blue: Vec::with_capacity(pixels),
    };
    for p in rgb.pixels() {
        out.red.push(p.0[0] as f64 / 255.0);
        out.green.push(p.0[1] as f64 / 255.0);
        out.blue.push(p.0[2] as f64 / 255.0);
    }
    out
}

/// Channel with the largest total intensity. Green or blue win only when
/// strictly greater than both others; red wins every tie.
pub fn dominant_color(red: &[f64], green: &[f64], blue: &[f64]) -> ColorBalance {
    let r: f64 = red.iter().sum();
    let g: f64 = green.iter().sum();
    let b: f64 = blue.iter().sum();

    let mut total = r + g + b;
    if total == 0.0 {
        total = 1.0;
    }

    let dominant = if g > r && g > b {
        Color::Green
    } else if b > r && b > g {
        Color::Blue
    } else {
        Color::Red
    };

    ColorBalance {
        dominant,
        red_pct: r / total * 100.0,
        green_pct: g / total * 100.0,
        blue_pct: b / total * 100.0,
    }
}

// ---------------------------------------------------------------------------
// Directories and dataset files
// ---------------------------------------------------------------------------

/// Image files in `dir` whose name starts with a vowel, sorted by file name.
pub fn scan_directory(dir: impl AsRef<Path>) -> Result<Vec<(Vowel, PathBuf)>> {
    let dir = dir.as_ref();
    let mut found = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(|e| NetError::io(dir, e))? {
        let path = entry.map_err(|e| NetError::io(dir, e))?.path();
        if !path.is_file() || !has_image_extension(&path) {
            continue;
        }
        let vowel = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.chars().next())
            .and_then(Vowel::from_char);
        match vowel {
            Some(v) => found.push((v, path)),
            None => warn!(path = %path.display(), "skipping image not named after a vowel"),
        }
    }

    found.sort_by(|a, b| a.1.file_name().cmp(&b.1.file_name()));
    Ok(found)
}

/// Normalises every vowel image in `dir`.
pub fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<VowelSample>> {
    scan_directory(dir)?
        .into_iter()
        .map(|(vowel, path)| Ok(VowelSample { vowel, image: normalize_image(&path)? }))
        .collect()
}

pub fn to_dataset(samples: &[VowelSample]) -> Dataset {
    let mut ds = Dataset::default();
    for s in samples {
        ds.push(s.image.features(), s.vowel.one_hot());
    }
    ds
}

/// One dataset line for `sample`, without the trailing newline.
pub fn format_sample(sample: &VowelSample) -> String {
    let label = sample
        .vowel
        .one_hot()
        .iter()
        .map(|&x| (x as u8).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "R[{}]+G[{}]+B[{}]:[{}]",
        join_floats(&sample.image.red),
        join_floats(&sample.image.green),
        join_floats(&sample.image.blue),
        label
    )
}

/// Parses one dataset line into (features, target).
pub fn parse_sample_line(line: &str) -> Option<(Vec<f64>, Vec<f64>)> {
    let rest = line.trim().strip_prefix("R[")?;
    let (r, rest) = rest.split_once("]+G[")?;
    let (g, rest) = rest.split_once("]+B[")?;
    let (b, rest) = rest.split_once("]:[")?;
    let label = rest.strip_suffix(']')?;

    let mut features = parse_list(r)?;
    features.extend(parse_list(g)?);
    features.extend(parse_list(b)?);
    Some((features, parse_list(label)?))
}

pub fn write_samples(samples: &[VowelSample], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|e| NetError::io(path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    for s in samples {
        writeln!(writer, "{}", format_sample(s)).map_err(|e| NetError::io(path, e))?;
    }
    writer.flush().map_err(|e| NetError::io(path, e))
}

/// Normalises `dir` and writes the dataset file. Returns the sample count.
pub fn normalize_directory(dir: impl AsRef<Path>, out: impl AsRef<Path>) -> Result<usize> {
    let samples = load_directory(dir)?;
    write_samples(&samples, &out)?;
    info!(samples = samples.len(), out = %out.as_ref().display(), "normalised vowel images");
    Ok(samples.len())
}

/// Reads a dataset file. Malformed lines are skipped with a warning; a file
/// with no valid line is `InvalidTrainingInput`.
pub fn read_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| NetError::io(path, e))?;

    let mut ds = Dataset::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_sample_line(line) {
            Some((features, target)) => ds.push(features, target),
            None => warn!(line = idx + 1, "skipping malformed vowel sample line"),
        }
    }

    if ds.is_empty() {
        return Err(NetError::InvalidTrainingInput(format!(
            "no valid samples in {}",
            path.display()
        )));
    }
    Ok(ds)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Runs `features` through a five-output network and names the strongest vowel.
pub fn classify_vowel(network: &Network, features: &[f64]) -> Result<VowelPrediction> {
    let output = network.predict(features)?;
    if output.len() != Vowel::ALL.len() {
        return Err(NetError::mismatch("vowel network outputs", Vowel::ALL.len(), output.len()));
    }
    let activations = Vowel::ALL
        .iter()
        .zip(output.iter())
        .map(|(&v, &a)| (v, a * 100.0))
        .collect();
    Ok(VowelPrediction {
        vowel: Vowel::ALL[argmax(&output)],
        activations,
    })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn join_floats(values: &[f64]) -> String {
    values.iter().map(|v| format!("{:?}", v)).collect::<Vec<_>>().join(", ")
}

fn parse_list(s: &str) -> Option<Vec<f64>> {
    s.split(',').map(|t| t.trim().parse::<f64>().ok()).collect()
}
