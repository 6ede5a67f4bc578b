use std::fmt::Debug;

use bytemuck::Pod;
use nalgebra::{RealField, SVector, Vector3};
use num_traits::{Bounded, FromPrimitive, NumCast, ToPrimitive};

/// Convenience trait that combines `Send` and `Sync`
pub trait ThreadSafe: Sync + Send {}
impl<T> ThreadSafe for T where T: Sync + Send {}

/// Trait that has to be implemented for types to be used as floating point values in the context of the library (coordinates, velocities, forces)
pub trait Real:
RealField
+ Bounded
+ Copy
+ FromPrimitive
+ ToPrimitive
+ NumCast
+ Debug
+ Default
+ Pod
+ ThreadSafe
{
    /// Tries to convert this value to another [`Real`] type `T` by converting first to `f64` followed by `T::from_f64`. If the value cannot be represented by the target type, `None` is returned.
    fn try_convert<T: Real>(self) -> Option<T> {
        T::from_f64(self.to_f64()?)
    }

    /// Tries to convert the values of a statically sized `nalgebra::SVector` to another type, same behavior as [`Real::try_convert`]
    fn try_convert_vec_from<R, const D: usize>(vec: &SVector<R, D>) -> Option<SVector<Self, D>>
        where
            R: Real,
    {
        let mut converted = SVector::<Self, D>::zeros();
        for i in 0..D {
            converted[i] = vec[i].try_convert()?
        }
        Some(converted)
    }

    /// Converts an `f64` literal into this type, panics if the value cannot be represented
    fn from_float(x: f64) -> Self {
        Self::from_f64(x).unwrap()
    }

    /// Converts a count (e.g. number of cells) into this type, panics if the value cannot be represented
    fn from_count(n: usize) -> Self {
        Self::from_usize(n).unwrap()
    }

    /// Converts this value to `f64`, panics if the value cannot be represented
    fn to_f64_unchecked(self) -> f64 {
        self.to_f64().unwrap()
    }
}

impl<
        T: RealField
            + Bounded
            + Copy
            + FromPrimitive
            + ToPrimitive
            + NumCast
            + Debug
            + Default
            + Pod
            + ThreadSafe
            + 'static,
    > Real for T
{
}

/// Conversion of whole vectors between [`Real`] types and to/from `f64` arrays (the wire representation)
pub trait RealConvert<R: Real> {
    /// Converts the vector into a plain `f64` array
    fn to_f64_array(&self) -> [f64; 3];
    /// Constructs the vector from a plain `f64` array, returns `None` if a component cannot be represented
    fn try_from_f64_array(values: [f64; 3]) -> Option<Vector3<R>>;
}

impl<R: Real> RealConvert<R> for Vector3<R> {
    fn to_f64_array(&self) -> [f64; 3] {
        [
            self.x.to_f64_unchecked(),
            self.y.to_f64_unchecked(),
            self.z.to_f64_unchecked(),
        ]
    }

    fn try_from_f64_array(values: [f64; 3]) -> Option<Vector3<R>> {
        Some(Vector3::new(
            R::from_f64(values[0])?,
            R::from_f64(values[1])?,
            R::from_f64(values[2])?,
        ))
    }
}

#[test]
fn test_real_convert_roundtrip_f32() {
    let v = Vector3::new(1.5f32, -2.25, 0.125);
    let arr = v.to_f64_array();
    assert_eq!(arr, [1.5, -2.25, 0.125]);
    assert_eq!(<Vector3<f32> as RealConvert<f32>>::try_from_f64_array(arr), Some(v));
}
