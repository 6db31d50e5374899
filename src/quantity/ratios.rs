quantity!(Percent, via: f64, suffix: "%", precision: 1);

impl Percent {
    pub const HUNDRED: Self = Self(100.0);

    pub fn to_proportion(self) -> f64 {
        self.0 / 100.0
    }
}
