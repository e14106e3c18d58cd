//! Declared transmission tables for the seeded SDSS bands.
//!
//! Each table samples the full system response (filter, detector and a
//! mean atmosphere at the survey airmass) in Å against a dimensionless
//! transmission. The tables stay fixed for the life of the process; runtime
//! additions go through [`super::register_band`] instead.

use super::PhotometricBand;

/// AB zero point shared by the SDSS bands, in Jansky.
pub(super) const AB_ZERO_POINT_JY: f64 = 3631.0;

const SDSS_U: &[(f64, f64)] = &[
    (2980.0, 0.000),
    (3050.0, 0.007),
    (3135.0, 0.028),
    (3220.0, 0.065),
    (3310.0, 0.105),
    (3400.0, 0.133),
    (3500.0, 0.152),
    (3600.0, 0.160),
    (3700.0, 0.158),
    (3800.0, 0.147),
    (3900.0, 0.124),
    (3980.0, 0.085),
    (4060.0, 0.032),
    (4130.0, 0.004),
    (4200.0, 0.000),
];

const SDSS_G: &[(f64, f64)] = &[
    (3630.0, 0.000),
    (3730.0, 0.010),
    (3830.0, 0.070),
    (3930.0, 0.210),
    (4030.0, 0.350),
    (4130.0, 0.415),
    (4230.0, 0.442),
    (4330.0, 0.454),
    (4430.0, 0.462),
    (4530.0, 0.465),
    (4630.0, 0.467),
    (4730.0, 0.467),
    (4830.0, 0.463),
    (4930.0, 0.457),
    (5030.0, 0.451),
    (5130.0, 0.443),
    (5230.0, 0.433),
    (5330.0, 0.418),
    (5430.0, 0.388),
    (5530.0, 0.250),
    (5630.0, 0.080),
    (5730.0, 0.014),
    (5830.0, 0.000),
];

const SDSS_R: &[(f64, f64)] = &[
    (5380.0, 0.000),
    (5480.0, 0.017),
    (5580.0, 0.142),
    (5680.0, 0.400),
    (5780.0, 0.536),
    (5880.0, 0.552),
    (5980.0, 0.554),
    (6080.0, 0.553),
    (6180.0, 0.549),
    (6280.0, 0.541),
    (6380.0, 0.531),
    (6480.0, 0.519),
    (6580.0, 0.505),
    (6680.0, 0.488),
    (6780.0, 0.470),
    (6880.0, 0.407),
    (6980.0, 0.148),
    (7080.0, 0.025),
    (7180.0, 0.004),
    (7230.0, 0.000),
];

const SDSS_I: &[(f64, f64)] = &[
    (6430.0, 0.000),
    (6530.0, 0.005),
    (6630.0, 0.055),
    (6730.0, 0.210),
    (6830.0, 0.385),
    (6930.0, 0.445),
    (7030.0, 0.458),
    (7130.0, 0.458),
    (7230.0, 0.455),
    (7330.0, 0.448),
    (7430.0, 0.439),
    (7530.0, 0.428),
    (7630.0, 0.416),
    (7730.0, 0.403),
    (7830.0, 0.389),
    (7930.0, 0.374),
    (8030.0, 0.358),
    (8130.0, 0.330),
    (8230.0, 0.242),
    (8330.0, 0.110),
    (8430.0, 0.030),
    (8530.0, 0.008),
    (8630.0, 0.000),
];

const SDSS_Z: &[(f64, f64)] = &[
    (7730.0, 0.000),
    (7930.0, 0.005),
    (8130.0, 0.028),
    (8330.0, 0.083),
    (8530.0, 0.120),
    (8730.0, 0.131),
    (8930.0, 0.129),
    (9130.0, 0.120),
    (9330.0, 0.107),
    (9530.0, 0.093),
    (9730.0, 0.079),
    (9930.0, 0.066),
    (10130.0, 0.053),
    (10330.0, 0.042),
    (10530.0, 0.032),
    (10730.0, 0.023),
    (10930.0, 0.015),
    (11130.0, 0.008),
    (11230.0, 0.000),
];

const SDSS_TABLES: [(&str, &[(f64, f64)]); 5] = [
    ("SDSS_u", SDSS_U),
    ("SDSS_g", SDSS_G),
    ("SDSS_r", SDSS_R),
    ("SDSS_i", SDSS_I),
    ("SDSS_z", SDSS_Z),
];

/// The bands the registry is seeded with.
pub(super) fn sdss_bands() -> Vec<PhotometricBand> {
    SDSS_TABLES
        .iter()
        .map(|(name, curve)| PhotometricBand::from_declared(*name, curve, AB_ZERO_POINT_JY))
        .collect()
}
