/// Strict bounds on one color channel.
///
/// Both bounds are exclusive: `above < value < below`. A missing bound is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelBound {
    pub above: Option<u8>,
    pub below: Option<u8>,
}

impl ChannelBound {
    pub const fn between(above: u8, below: u8) -> Self {
        Self {
            above: Some(above),
            below: Some(below),
        }
    }

    pub const fn below(below: u8) -> Self {
        Self {
            above: None,
            below: Some(below),
        }
    }

    pub fn contains(&self, value: u8) -> bool {
        self.above.is_none_or(|low| value > low) && self.below.is_none_or(|high| value < high)
    }
}

/// One named RGB-range predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorRule {
    pub name: &'static str,
    pub r: ChannelBound,
    pub g: ChannelBound,
    pub b: ChannelBound,
}

impl ColorRule {
    pub fn matches(&self, r: u8, g: u8, b: u8) -> bool {
        self.r.contains(r) && self.g.contains(g) && self.b.contains(b)
    }
}

/// Set of color rules combined with logical OR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorProfile {
    pub name: &'static str,
    pub rules: Vec<ColorRule>,
}

impl ColorProfile {
    /// Terracotta pot profile: bright orange plus a darker orange for shaded sides.
    pub fn pot() -> Self {
        Self {
            name: "pot",
            rules: vec![
                ColorRule {
                    name: "orange-pot",
                    r: ChannelBound::between(180, 255),
                    g: ChannelBound::between(80, 180),
                    b: ChannelBound::below(100),
                },
                ColorRule {
                    name: "darker-orange",
                    r: ChannelBound::between(150, 200),
                    g: ChannelBound::between(60, 120),
                    b: ChannelBound::below(80),
                },
            ],
        }
    }

    pub fn matches(&self, r: u8, g: u8, b: u8) -> bool {
        self.rules.iter().any(|rule| rule.matches(r, g, b))
    }

    /// Name of the first rule matching `(r, g, b)`.
    pub fn matching_rule(&self, r: u8, g: u8, b: u8) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(r, g, b))
            .map(|rule| rule.name)
    }
}

impl Default for ColorProfile {
    fn default() -> Self {
        Self::pot()
    }
}
