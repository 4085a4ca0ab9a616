use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

/// One of the four right-angle page rotations, clockwise. Serializes as its
/// degree number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Lossless rotation of the page.
    pub fn apply(self, image: &RgbImage) -> RgbImage {
        match self {
            Rotation::Deg0 => image.clone(),
            Rotation::Deg90 => imageops::rotate90(image),
            Rotation::Deg180 => imageops::rotate180(image),
            Rotation::Deg270 => imageops::rotate270(image),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;
    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("Unsupported rotation: {other} (expected 0, 90, 180 or 270)")),
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

impl std::str::FromStr for Rotation {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let degrees: u16 = s
            .trim()
            .parse()
            .map_err(|_| format!("Unknown rotation: '{s}'"))?;
        Rotation::try_from(degrees)
    }
}

/// Document-type tag supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Receipt,
    Estimate,
    #[default]
    Other,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Invoice => write!(f, "invoice"),
            DocumentKind::Receipt => write!(f, "receipt"),
            DocumentKind::Estimate => write!(f, "estimate"),
            DocumentKind::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(DocumentKind::Invoice),
            "receipt" => Ok(DocumentKind::Receipt),
            "estimate" => Ok(DocumentKind::Estimate),
            "other" => Ok(DocumentKind::Other),
            other => Err(format!("Unknown document kind: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn rotation_serializes_as_degrees() {
        assert_eq!(serde_json::to_string(&Rotation::Deg270).unwrap(), "270");
        let parsed: Vec<Rotation> = serde_json::from_str("[0, 90]").unwrap();
        assert_eq!(parsed, vec![Rotation::Deg0, Rotation::Deg90]);
        assert!(serde_json::from_str::<Rotation>("45").is_err());
    }

    #[test]
    fn rotation_from_str() {
        assert_eq!("180".parse::<Rotation>(), Ok(Rotation::Deg180));
        assert_eq!(" 90 ".parse::<Rotation>(), Ok(Rotation::Deg90));
        assert!("ninety".parse::<Rotation>().is_err());
        assert!("360".parse::<Rotation>().is_err());
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        let mut image = RgbImage::from_pixel(3, 2, Rgb([255, 255, 255]));
        image.put_pixel(0, 0, Rgb([0, 0, 0]));
        let turned = Rotation::Deg90.apply(&image);
        assert_eq!(turned.dimensions(), (2, 3));
        // The top-left corner moves to the top-right.
        assert_eq!(turned.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn document_kind_round_trip() {
        for kind in [DocumentKind::Invoice, DocumentKind::Receipt, DocumentKind::Estimate, DocumentKind::Other] {
            assert_eq!(kind.to_string().parse::<DocumentKind>(), Ok(kind));
        }
        assert!("memo".parse::<DocumentKind>().is_err());
        assert_eq!(DocumentKind::default(), DocumentKind::Other);
        assert_eq!(serde_json::to_string(&DocumentKind::Receipt).unwrap(), "\"receipt\"");
    }
}
