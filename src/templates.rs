use serde::Serialize;

/// An sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Components scaled to 0.0..=1.0, as PDF color operators expect
    pub fn unit(&self) -> (f32, f32, f32) {
        (
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        )
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// A certificate color preset
///
/// `background` holds the base fill and the three horizontal bands (top 30%,
/// middle 40%, bottom 30%) drawn over it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CertificateTemplate {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub background: [Rgb; 4],
    /// Outer border, subtitle and left signature
    pub primary: Rgb,
    /// Inner border, participant name and right signature
    pub secondary: Rgb,
    /// Name underline, rules and QR frame
    pub accent: Rgb,
    /// Event title and decorative dots
    pub highlight: Rgb,
    /// Body text
    pub text: Rgb,
    /// Footer text
    pub muted: Rgb,
}

pub const DEFAULT_TEMPLATE_ID: u32 = 1;

pub static TEMPLATES: [CertificateTemplate; 7] = [
    CertificateTemplate {
        id: 1,
        name: "Midnight Aurora",
        description: "Deep slate gradient with violet and cyan borders",
        background: [
            Rgb::hex(0x0f172a),
            Rgb::hex(0x1e293b),
            Rgb::hex(0x334155),
            Rgb::hex(0x475569),
        ],
        primary: Rgb::hex(0xa78bfa),
        secondary: Rgb::hex(0x22d3ee),
        accent: Rgb::hex(0x34d399),
        highlight: Rgb::hex(0xfbbf24),
        text: Rgb::hex(0xffffff),
        muted: Rgb::hex(0x94a3b8),
    },
    CertificateTemplate {
        id: 2,
        name: "Royal Gold",
        description: "Navy background framed in gold",
        background: [
            Rgb::hex(0x0c1445),
            Rgb::hex(0x172554),
            Rgb::hex(0x1e3a8a),
            Rgb::hex(0x1e40af),
        ],
        primary: Rgb::hex(0xfbbf24),
        secondary: Rgb::hex(0xfde68a),
        accent: Rgb::hex(0xf59e0b),
        highlight: Rgb::hex(0xfcd34d),
        text: Rgb::hex(0xffffff),
        muted: Rgb::hex(0xbfdbfe),
    },
    CertificateTemplate {
        id: 3,
        name: "Emerald Forest",
        description: "Green tones with mint accents",
        background: [
            Rgb::hex(0x022c22),
            Rgb::hex(0x064e3b),
            Rgb::hex(0x065f46),
            Rgb::hex(0x047857),
        ],
        primary: Rgb::hex(0x6ee7b7),
        secondary: Rgb::hex(0xa7f3d0),
        accent: Rgb::hex(0x10b981),
        highlight: Rgb::hex(0xfde047),
        text: Rgb::hex(0xffffff),
        muted: Rgb::hex(0xd1fae5),
    },
    CertificateTemplate {
        id: 4,
        name: "Crimson Ember",
        description: "Dark red gradient with warm orange highlights",
        background: [
            Rgb::hex(0x2a0a0a),
            Rgb::hex(0x450a0a),
            Rgb::hex(0x7f1d1d),
            Rgb::hex(0x991b1b),
        ],
        primary: Rgb::hex(0xfca5a5),
        secondary: Rgb::hex(0xfdba74),
        accent: Rgb::hex(0xf97316),
        highlight: Rgb::hex(0xfde68a),
        text: Rgb::hex(0xffffff),
        muted: Rgb::hex(0xfecaca),
    },
    CertificateTemplate {
        id: 5,
        name: "Ocean Breeze",
        description: "Teal and sky blue waves",
        background: [
            Rgb::hex(0x082f49),
            Rgb::hex(0x0c4a6e),
            Rgb::hex(0x075985),
            Rgb::hex(0x0369a1),
        ],
        primary: Rgb::hex(0x7dd3fc),
        secondary: Rgb::hex(0x5eead4),
        accent: Rgb::hex(0x2dd4bf),
        highlight: Rgb::hex(0xfef08a),
        text: Rgb::hex(0xffffff),
        muted: Rgb::hex(0xbae6fd),
    },
    CertificateTemplate {
        id: 6,
        name: "Sunset Blaze",
        description: "Purple to magenta dusk palette",
        background: [
            Rgb::hex(0x2e1065),
            Rgb::hex(0x4c1d95),
            Rgb::hex(0x6b21a8),
            Rgb::hex(0x86198f),
        ],
        primary: Rgb::hex(0xf0abfc),
        secondary: Rgb::hex(0xfda4af),
        accent: Rgb::hex(0xfb7185),
        highlight: Rgb::hex(0xfcd34d),
        text: Rgb::hex(0xffffff),
        muted: Rgb::hex(0xe9d5ff),
    },
    CertificateTemplate {
        id: 7,
        name: "Classic Ivory",
        description: "Light paper look with dark ink",
        background: [
            Rgb::hex(0xfffbeb),
            Rgb::hex(0xfef3c7),
            Rgb::hex(0xfffbeb),
            Rgb::hex(0xfef3c7),
        ],
        primary: Rgb::hex(0x92400e),
        secondary: Rgb::hex(0x1e3a8a),
        accent: Rgb::hex(0xb45309),
        highlight: Rgb::hex(0x7c2d12),
        text: Rgb::hex(0x111827),
        muted: Rgb::hex(0x4b5563),
    },
];

/// Look up a template, falling back to template 1 for unknown ids
pub fn template(id: u32) -> &'static CertificateTemplate {
    TEMPLATES
        .iter()
        .find(|t| t.id == id)
        .unwrap_or(&TEMPLATES[0])
}

pub fn templates() -> &'static [CertificateTemplate] {
    &TEMPLATES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_splits_channels() {
        assert_eq!(Rgb::hex(0x0f172a), Rgb(0x0f, 0x17, 0x2a));
        assert_eq!(Rgb::hex(0x22d3ee).to_hex(), "#22d3ee");
    }

    #[test]
    fn every_id_is_unique_and_sequential() {
        for (i, t) in TEMPLATES.iter().enumerate() {
            assert_eq!(t.id as usize, i + 1);
        }
    }
}
