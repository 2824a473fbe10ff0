use crate::error::Result;
use crate::protocol::params::ParameterList;
use crate::value::Value;

/// A set of values bound to a statement's placeholders in order
///
/// # Examples
/// - `()`
/// - `(42, "hello")`
/// - `vec![Value::Int(1), Value::Null]`
pub trait Params {
    /// Number of parameters
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind every value, starting at index 1
    fn bind_to(&self, list: &mut ParameterList) -> Result<()>;
}

impl Params for () {
    fn len(&self) -> usize {
        0
    }

    fn bind_to(&self, _list: &mut ParameterList) -> Result<()> {
        Ok(())
    }
}

impl Params for [Value] {
    fn len(&self) -> usize {
        <[Value]>::len(self)
    }

    fn bind_to(&self, list: &mut ParameterList) -> Result<()> {
        for (i, value) in self.iter().enumerate() {
            list.bind(i + 1, value.clone())?;
        }
        Ok(())
    }
}

impl Params for Vec<Value> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn bind_to(&self, list: &mut ParameterList) -> Result<()> {
        self.as_slice().bind_to(list)
    }
}

impl<P: Params + ?Sized> Params for &P {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn bind_to(&self, list: &mut ParameterList) -> Result<()> {
        (**self).bind_to(list)
    }
}

macro_rules! impl_params_tuple {
    ($n:expr; $($idx:tt: $T:ident),+) => {
        impl<$($T: Clone + Into<Value>),+> Params for ($($T,)+) {
            fn len(&self) -> usize {
                $n
            }

            fn bind_to(&self, list: &mut ParameterList) -> Result<()> {
                $(
                    list.bind($idx + 1, self.$idx.clone())?;
                )+
                Ok(())
            }
        }
    };
}

impl_params_tuple!(1; 0: A);
impl_params_tuple!(2; 0: A, 1: B);
impl_params_tuple!(3; 0: A, 1: B, 2: C);
impl_params_tuple!(4; 0: A, 1: B, 2: C, 3: D);
impl_params_tuple!(5; 0: A, 1: B, 2: C, 3: D, 4: E);
impl_params_tuple!(6; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F);
impl_params_tuple!(7; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G);
impl_params_tuple!(8; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H);
impl_params_tuple!(9; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I);
impl_params_tuple!(10; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I, 9: J);
impl_params_tuple!(11; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I, 9: J, 10: K);
impl_params_tuple!(12; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I, 9: J, 10: K, 11: L);
