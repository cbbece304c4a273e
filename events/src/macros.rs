/// Implement another macro for tuples of types recursively.
macro_rules! for_every_tuple {
    ($m:ident !! $head_ty:ident) => {
        $m!($head_ty);
    };
    ($m:ident !! $head_ty:ident, $($tail_ty:ident),*) => (
        $m!($head_ty, $( $tail_ty ),*);
        for_every_tuple!($m !! $( $tail_ty ),*);
    );
}

/// Apply a macro to every listener arity from one to eight parameters. The zero parameter case
/// is implemented by hand next to each use.
macro_rules! all_arities {
    ($m:ident) => {
        for_every_tuple!($m !! A, B, C, D, E, F, G, H);
    };
}

#[cfg(test)]
mod tests {
    use std::marker::PhantomData;

    struct Args<Params>(PhantomData<Params>);

    macro_rules! arity_impl {
        ($($name: ident),*) => {
            #[allow(dead_code)]
            impl<$($name),*> Args<($($name,)*)> {
                pub fn arity(&self) -> usize {
                    [$(stringify!($name)),*].len()
                }
            }
        }
    }

    all_arities!(arity_impl);

    #[test]
    fn every_arity_is_generated() {
        // Given
        let one = Args::<(u8,)>(PhantomData);
        let four = Args::<(u8, u16, u32, u64)>(PhantomData);
        let eight = Args::<(u8, u8, u8, u8, u8, u8, u8, u8)>(PhantomData);

        // Then
        assert_eq!(one.arity(), 1);
        assert_eq!(four.arity(), 4);
        assert_eq!(eight.arity(), 8);
    }
}
