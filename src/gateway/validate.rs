//! Checks applied before a request reaches the back-end.

use crate::proto::*;
use crate::store::{MAX_POINT_WIDTH, MAX_RESOLUTION};

/// Request-level validation. The error is the message returned with HTTP 400.
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn uuid(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() == 16 {
        Ok(())
    } else {
        Err(format!("uuid must be 16 bytes, got {}", bytes.len()))
    }
}

fn range(start: i64, end: i64) -> Result<(), String> {
    if end <= start {
        Err(format!("end ({end}) must be after start ({start})"))
    } else {
        Ok(())
    }
}

macro_rules! uuid_only {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Validate for $ty {
                fn validate(&self) -> Result<(), String> {
                    uuid(&self.uuid)
                }
            }
        )*
    };
}

macro_rules! unchecked {
    ($($ty:ty),* $(,)?) => {
        $( impl Validate for $ty {} )*
    };
}

uuid_only!(
    StreamInfoParams,
    SetStreamAnnotationsParams,
    SetStreamTagsParams,
    CreateParams,
    NearestParams,
    InsertParams,
    FlushParams,
    ObliterateParams,
);

unchecked!(
    MetadataUsageParams,
    ListCollectionsParams,
    LookupStreamsParams,
    InfoParams,
    FaultInjectParams,
    SqlQueryParams,
);

impl Validate for RawValuesParams {
    fn validate(&self) -> Result<(), String> {
        uuid(&self.uuid)?;
        range(self.start, self.end)
    }
}

impl Validate for AlignedWindowsParams {
    fn validate(&self) -> Result<(), String> {
        uuid(&self.uuid)?;
        range(self.start, self.end)?;
        if self.point_width > MAX_POINT_WIDTH {
            return Err(format!(
                "point width {} exceeds {MAX_POINT_WIDTH}",
                self.point_width
            ));
        }
        Ok(())
    }
}

impl Validate for WindowsParams {
    fn validate(&self) -> Result<(), String> {
        uuid(&self.uuid)?;
        range(self.start, self.end)?;
        if self.width == 0 {
            return Err("window width must be positive".to_string());
        }
        Ok(())
    }
}

impl Validate for DeleteParams {
    fn validate(&self) -> Result<(), String> {
        uuid(&self.uuid)?;
        range(self.start, self.end)
    }
}

impl Validate for ChangesParams {
    fn validate(&self) -> Result<(), String> {
        uuid(&self.uuid)?;
        if self.resolution > MAX_RESOLUTION {
            return Err(format!(
                "resolution {} exceeds {MAX_RESOLUTION}",
                self.resolution
            ));
        }
        Ok(())
    }
}

impl Validate for GenerateCsvParams {
    fn validate(&self) -> Result<(), String> {
        range(self.start_time, self.end_time)?;
        self.streams
            .iter()
            .try_for_each(|stream| uuid(&stream.uuid))
    }
}
