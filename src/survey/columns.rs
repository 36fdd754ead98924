//! Finds coordinate and image-related columns by name.

const START_LAT: &[&str] = &[
    "awal latitude", "awal lat", "koordinat latitude", "koordinat lat", "latitude awal", "lat awal", "latitude 1", "lat 1",
    "latitude", "lat",
];
const START_LON: &[&str] = &[
    "awal longitude", "awal lon", "koordinat longitude", "koordinat lon", "longitude awal", "lon awal", "longitude 1", "lon 1",
    "longitude", "lon",
];
const END_LAT: &[&str] = &["akhir latitude", "akhir lat", "latitude akhir", "lat akhir", "latitude 2", "lat 2"];
const END_LON: &[&str] = &["akhir longitude", "akhir lon", "longitude akhir", "lon akhir", "longitude 2", "lon 2"];

const SIGN_NAME: &str = "nama rambu";

/// Column indices for each role of a sheet, `None` where no column matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub start_lat: Option<usize>,
    pub start_lon: Option<usize>,
    pub end_lat: Option<usize>,
    pub end_lon: Option<usize>,
    /// Names the sign picture linked from each record.
    pub sign_name: Option<usize>,
}

/// First column matching a pattern, trying patterns in priority order.
fn find_column(columns: &[String], patterns: &[&str], claimed: &[Option<usize>]) -> Option<usize> {
    patterns.iter().find_map(|pattern| {
        columns
            .iter()
            .enumerate()
            .filter(|(index, _)| !claimed.contains(&Some(*index)))
            .find(|(_, column)| column.to_lowercase().contains(pattern))
            .map(|(index, _)| index)
    })
}

impl ColumnRoles {
    pub fn resolve(columns: &[String]) -> Self {
        let start_lat = find_column(columns, START_LAT, &[]);
        let start_lon = find_column(columns, START_LON, &[start_lat]);
        let claimed = [start_lat, start_lon];
        let end_lat = find_column(columns, END_LAT, &claimed);
        let end_lon = find_column(columns, END_LON, &claimed);
        Self {
            start_lat,
            start_lon,
            end_lat,
            end_lon,
            sign_name: find_column(columns, &[SIGN_NAME], &[]),
        }
    }

    pub fn start(&self) -> Option<(usize, usize)> {
        self.start_lat.zip(self.start_lon)
    }

    pub fn end(&self) -> Option<(usize, usize)> {
        self.end_lat.zip(self.end_lon)
    }

    /// Every resolved coordinate column; these never become output properties.
    pub fn coordinate_columns(&self) -> Vec<usize> {
        [self.start_lat, self.start_lon, self.end_lat, self.end_lon]
            .into_iter()
            .flatten()
            .collect()
    }
}
