quantity!(Kilowatts, f64, "kW");
quantity!(Megawatts, f64, "MW");

impl Kilowatts {
    /// Negative readings are physically meaningless for generation, they are reported as zero.
    #[must_use]
    pub fn non_negative(self) -> Self {
        if self.0 < 0.0 { Self::ZERO } else { self }
    }

    #[must_use]
    pub fn round(self) -> Self {
        Self(self.0.round())
    }

    #[must_use]
    pub fn trunc(self) -> Self {
        Self(self.0.trunc())
    }
}

impl From<Kilowatts> for Megawatts {
    fn from(kilowatts: Kilowatts) -> Self {
        Self(kilowatts.0 / 1000.0)
    }
}

impl From<Megawatts> for Kilowatts {
    fn from(megawatts: Megawatts) -> Self {
        Self(megawatts.0 * 1000.0)
    }
}
