// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::str::FromStr;

/// Shading model used by the composition pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Technique {
    NormalDirection,
    ViewDirection,
    LightDirection,
    #[default]
    BlinnPhong,
    Pbr,
}

impl Technique {
    pub const ALL: [Technique; 5] = [
        Technique::NormalDirection,
        Technique::ViewDirection,
        Technique::LightDirection,
        Technique::BlinnPhong,
        Technique::Pbr,
    ];

    /// Position in [`Technique::ALL`], also the per-technique pipeline slot.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Flag written to the scene uniform.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Technique::NormalDirection => "normal",
            Technique::ViewDirection => "view",
            Technique::LightDirection => "light",
            Technique::BlinnPhong => "blinn-phong",
            Technique::Pbr => "pbr",
        }
    }

    /// Logical name of the composition fragment shader.
    pub fn fragment_shader(self) -> &'static str {
        match self {
            Technique::NormalDirection => "composite_normal.frag",
            Technique::ViewDirection => "composite_view.frag",
            Technique::LightDirection => "composite_light.frag",
            Technique::BlinnPhong => "composite_blinn_phong.frag",
            Technique::Pbr => "composite_pbr.frag",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTechnique(pub String);

impl fmt::Display for UnknownTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown technique `{}` (expected normal, view, light, blinn-phong or pbr)",
            self.0
        )
    }
}

impl std::error::Error for UnknownTechnique {}

impl FromStr for Technique {
    type Err = UnknownTechnique;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Technique::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .or(match lower.as_str() {
                "blinn" | "blinnphong" | "blinn_phong" => Some(Technique::BlinnPhong),
                _ => None,
            })
            .ok_or(UnknownTechnique(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_declaration_order() {
        for (i, t) in Technique::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
            assert_eq!(t.code(), i as u32);
        }
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("PBR".parse::<Technique>().unwrap(), Technique::Pbr);
        assert_eq!("blinn_phong".parse::<Technique>().unwrap(), Technique::BlinnPhong);
        for t in Technique::ALL {
            assert_eq!(t.to_string().parse::<Technique>().unwrap(), t);
        }
        assert!("toon".parse::<Technique>().is_err());
    }
}
