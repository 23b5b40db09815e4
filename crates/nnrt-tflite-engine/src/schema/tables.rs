//! Readers for the TFLite schema v3 tables (`tensorflow/lite/schema/schema.fbs`).
//!
//! These follow the layout flatc generates for that schema: every `VT_*` constant is the
//! vtable slot of the field with the same name in `schema.fbs`, and defaults match the
//! schema's declared defaults. Keep them in sync with the schema when adding a field or
//! table; slots are `4 + 2 * field_id`.

use super::enums::BuiltinOptions;
use flatbuffers::{
    Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Vector, Verifiable, Verifier,
};

macro_rules! schema_table {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq)]
        pub struct $name<'a> {
            pub _tab: Table<'a>,
        }

        impl<'a> Follow<'a> for $name<'a> {
            type Inner = $name<'a>;

            #[inline]
            unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
                Self {
                    _tab: Table::new(buf, loc),
                }
            }
        }
    };
}

type TableVector<'a, T> = Vector<'a, ForwardsUOffset<T>>;

schema_table!(
    /// Root table of a model file.
    Model
);

impl<'a> Model<'a> {
    pub const VT_VERSION: VOffsetT = 4;
    pub const VT_OPERATOR_CODES: VOffsetT = 6;
    pub const VT_SUBGRAPHS: VOffsetT = 8;
    pub const VT_DESCRIPTION: VOffsetT = 10;
    pub const VT_BUFFERS: VOffsetT = 12;

    pub fn version(&self) -> u32 {
        // SAFETY: the buffer was verified before this table was handed out.
        unsafe { self._tab.get::<u32>(Self::VT_VERSION, Some(0)).unwrap_or(0) }
    }

    pub fn operator_codes(&self) -> Option<TableVector<'a, OperatorCode<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<TableVector<'a, OperatorCode<'a>>>>(
                    Self::VT_OPERATOR_CODES,
                    None,
                )
        }
    }

    pub fn subgraphs(&self) -> Option<TableVector<'a, SubGraph<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<TableVector<'a, SubGraph<'a>>>>(Self::VT_SUBGRAPHS, None)
        }
    }

    pub fn description(&self) -> Option<&'a str> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<&str>>(Self::VT_DESCRIPTION, None)
        }
    }

    pub fn buffers(&self) -> Option<TableVector<'a, Buffer<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<TableVector<'a, Buffer<'a>>>>(Self::VT_BUFFERS, None)
        }
    }
}

impl Verifiable for Model<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("version", Self::VT_VERSION, false)?
            .visit_field::<ForwardsUOffset<TableVector<'_, OperatorCode>>>(
                "operator_codes",
                Self::VT_OPERATOR_CODES,
                false,
            )?
            .visit_field::<ForwardsUOffset<TableVector<'_, SubGraph>>>(
                "subgraphs",
                Self::VT_SUBGRAPHS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("description", Self::VT_DESCRIPTION, false)?
            .visit_field::<ForwardsUOffset<TableVector<'_, Buffer>>>(
                "buffers",
                Self::VT_BUFFERS,
                false,
            )?
            .finish();
        Ok(())
    }
}

schema_table!(SubGraph);

impl<'a> SubGraph<'a> {
    pub const VT_TENSORS: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_OPERATORS: VOffsetT = 10;
    pub const VT_NAME: VOffsetT = 12;

    pub fn tensors(&self) -> Option<TableVector<'a, Tensor<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<TableVector<'a, Tensor<'a>>>>(Self::VT_TENSORS, None)
        }
    }

    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None)
        }
    }

    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None)
        }
    }

    pub fn operators(&self) -> Option<TableVector<'a, Operator<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<TableVector<'a, Operator<'a>>>>(Self::VT_OPERATORS, None)
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for SubGraph<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<TableVector<'_, Tensor>>>(
                "tensors",
                Self::VT_TENSORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_field::<ForwardsUOffset<TableVector<'_, Operator>>>(
                "operators",
                Self::VT_OPERATORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

schema_table!(Tensor);

impl<'a> Tensor<'a> {
    pub const VT_SHAPE: VOffsetT = 4;
    pub const VT_TYPE: VOffsetT = 6;
    pub const VT_BUFFER: VOffsetT = 8;
    pub const VT_NAME: VOffsetT = 10;

    pub fn shape(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_SHAPE, None)
        }
    }

    /// Raw `TensorType` value.
    pub fn type_(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_TYPE, Some(0)).unwrap_or(0) }
    }

    pub fn buffer(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_BUFFER, Some(0)).unwrap_or(0) }
    }

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for Tensor<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("shape", Self::VT_SHAPE, false)?
            .visit_field::<i8>("type", Self::VT_TYPE, false)?
            .visit_field::<u32>("buffer", Self::VT_BUFFER, false)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

schema_table!(Buffer);

impl<'a> Buffer<'a> {
    pub const VT_DATA: VOffsetT = 4;

    pub fn data(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_DATA, None)
        }
    }

    /// Raw payload; empty when the buffer carries no data.
    pub fn bytes(&self) -> &'a [u8] {
        self.data().map(|data| data.bytes()).unwrap_or(&[])
    }
}

impl Verifiable for Buffer<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>("data", Self::VT_DATA, false)?
            .finish();
        Ok(())
    }
}

schema_table!(OperatorCode);

impl<'a> OperatorCode<'a> {
    pub const VT_DEPRECATED_BUILTIN_CODE: VOffsetT = 4;
    pub const VT_CUSTOM_CODE: VOffsetT = 6;
    pub const VT_VERSION: VOffsetT = 8;
    pub const VT_BUILTIN_CODE: VOffsetT = 10;

    pub fn deprecated_builtin_code(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_DEPRECATED_BUILTIN_CODE, Some(0)).unwrap_or(0) }
    }

    pub fn custom_code(&self) -> Option<&'a str> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<&str>>(Self::VT_CUSTOM_CODE, None)
        }
    }

    pub fn version(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_VERSION, Some(1)).unwrap_or(1) }
    }

    pub fn builtin_code(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_BUILTIN_CODE, Some(0)).unwrap_or(0) }
    }

    /// Builtin code honoring both the legacy `i8` field and the extended `i32` field.
    pub fn effective_builtin_code(&self) -> i32 {
        self.builtin_code()
            .max(i32::from(self.deprecated_builtin_code()))
    }
}

impl Verifiable for OperatorCode<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>(
                "deprecated_builtin_code",
                Self::VT_DEPRECATED_BUILTIN_CODE,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("custom_code", Self::VT_CUSTOM_CODE, false)?
            .visit_field::<i32>("version", Self::VT_VERSION, false)?
            .visit_field::<i32>("builtin_code", Self::VT_BUILTIN_CODE, false)?
            .finish();
        Ok(())
    }
}

schema_table!(Operator);

impl<'a> Operator<'a> {
    pub const VT_OPCODE_INDEX: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_BUILTIN_OPTIONS_TYPE: VOffsetT = 10;
    pub const VT_BUILTIN_OPTIONS: VOffsetT = 12;

    pub fn opcode_index(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_OPCODE_INDEX, Some(0)).unwrap_or(0) }
    }

    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None)
        }
    }

    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None)
        }
    }

    /// Raw `BuiltinOptions` discriminant.
    pub fn builtin_options_type(&self) -> u8 {
        unsafe { self._tab.get::<u8>(Self::VT_BUILTIN_OPTIONS_TYPE, Some(0)).unwrap_or(0) }
    }

    pub fn builtin_options(&self) -> Option<Table<'a>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Table<'a>>>(Self::VT_BUILTIN_OPTIONS, None)
        }
    }

    fn options_table(&self, expected: BuiltinOptions) -> Option<Table<'a>> {
        if self.builtin_options_type() == expected as u8 {
            self.builtin_options()
        } else {
            None
        }
    }

    pub fn builtin_options_as_conv_2d_options(&self) -> Option<Conv2DOptions<'a>> {
        self.options_table(BuiltinOptions::Conv2DOptions)
            .map(|_tab| Conv2DOptions { _tab })
    }

    pub fn builtin_options_as_depthwise_conv_2d_options(
        &self,
    ) -> Option<DepthwiseConv2DOptions<'a>> {
        self.options_table(BuiltinOptions::DepthwiseConv2DOptions)
            .map(|_tab| DepthwiseConv2DOptions { _tab })
    }

    pub fn builtin_options_as_pool_2d_options(&self) -> Option<Pool2DOptions<'a>> {
        self.options_table(BuiltinOptions::Pool2DOptions)
            .map(|_tab| Pool2DOptions { _tab })
    }

    pub fn builtin_options_as_softmax_options(&self) -> Option<SoftmaxOptions<'a>> {
        self.options_table(BuiltinOptions::SoftmaxOptions)
            .map(|_tab| SoftmaxOptions { _tab })
    }

    pub fn builtin_options_as_add_options(&self) -> Option<AddOptions<'a>> {
        self.options_table(BuiltinOptions::AddOptions)
            .map(|_tab| AddOptions { _tab })
    }

    pub fn builtin_options_as_squeeze_options(&self) -> Option<SqueezeOptions<'a>> {
        self.options_table(BuiltinOptions::SqueezeOptions)
            .map(|_tab| SqueezeOptions { _tab })
    }
}

impl Verifiable for Operator<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("opcode_index", Self::VT_OPCODE_INDEX, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_union::<u8, _>(
                "builtin_options_type",
                Self::VT_BUILTIN_OPTIONS_TYPE,
                "builtin_options",
                Self::VT_BUILTIN_OPTIONS,
                false,
                |key, v, pos| match BuiltinOptions::from_u8(key) {
                    Some(BuiltinOptions::Conv2DOptions) => v
                        .verify_union_variant::<ForwardsUOffset<Conv2DOptions>>(
                            "BuiltinOptions::Conv2DOptions",
                            pos,
                        ),
                    Some(BuiltinOptions::DepthwiseConv2DOptions) => v
                        .verify_union_variant::<ForwardsUOffset<DepthwiseConv2DOptions>>(
                            "BuiltinOptions::DepthwiseConv2DOptions",
                            pos,
                        ),
                    Some(BuiltinOptions::Pool2DOptions) => v
                        .verify_union_variant::<ForwardsUOffset<Pool2DOptions>>(
                            "BuiltinOptions::Pool2DOptions",
                            pos,
                        ),
                    Some(BuiltinOptions::SoftmaxOptions) => v
                        .verify_union_variant::<ForwardsUOffset<SoftmaxOptions>>(
                            "BuiltinOptions::SoftmaxOptions",
                            pos,
                        ),
                    Some(BuiltinOptions::AddOptions) => v
                        .verify_union_variant::<ForwardsUOffset<AddOptions>>(
                            "BuiltinOptions::AddOptions",
                            pos,
                        ),
                    Some(BuiltinOptions::SqueezeOptions) => v
                        .verify_union_variant::<ForwardsUOffset<SqueezeOptions>>(
                            "BuiltinOptions::SqueezeOptions",
                            pos,
                        ),
                    Some(BuiltinOptions::None) | None => Ok(()),
                },
            )?
            .finish();
        Ok(())
    }
}

schema_table!(Conv2DOptions);

impl<'a> Conv2DOptions<'a> {
    pub const VT_PADDING: VOffsetT = 4;
    pub const VT_STRIDE_W: VOffsetT = 6;
    pub const VT_STRIDE_H: VOffsetT = 8;
    pub const VT_FUSED_ACTIVATION_FUNCTION: VOffsetT = 10;
    pub const VT_DILATION_W_FACTOR: VOffsetT = 12;
    pub const VT_DILATION_H_FACTOR: VOffsetT = 14;

    pub fn padding(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_PADDING, Some(0)).unwrap_or(0) }
    }

    pub fn stride_w(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_W, Some(0)).unwrap_or(0) }
    }

    pub fn stride_h(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_H, Some(0)).unwrap_or(0) }
    }

    pub fn fused_activation_function(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_FUSED_ACTIVATION_FUNCTION, Some(0)).unwrap_or(0) }
    }

    pub fn dilation_w_factor(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_DILATION_W_FACTOR, Some(1)).unwrap_or(1) }
    }

    pub fn dilation_h_factor(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_DILATION_H_FACTOR, Some(1)).unwrap_or(1) }
    }
}

impl Verifiable for Conv2DOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>("padding", Self::VT_PADDING, false)?
            .visit_field::<i32>("stride_w", Self::VT_STRIDE_W, false)?
            .visit_field::<i32>("stride_h", Self::VT_STRIDE_H, false)?
            .visit_field::<i8>(
                "fused_activation_function",
                Self::VT_FUSED_ACTIVATION_FUNCTION,
                false,
            )?
            .visit_field::<i32>("dilation_w_factor", Self::VT_DILATION_W_FACTOR, false)?
            .visit_field::<i32>("dilation_h_factor", Self::VT_DILATION_H_FACTOR, false)?
            .finish();
        Ok(())
    }
}

schema_table!(DepthwiseConv2DOptions);

impl<'a> DepthwiseConv2DOptions<'a> {
    pub const VT_PADDING: VOffsetT = 4;
    pub const VT_STRIDE_W: VOffsetT = 6;
    pub const VT_STRIDE_H: VOffsetT = 8;
    pub const VT_DEPTH_MULTIPLIER: VOffsetT = 10;
    pub const VT_FUSED_ACTIVATION_FUNCTION: VOffsetT = 12;
    pub const VT_DILATION_W_FACTOR: VOffsetT = 14;
    pub const VT_DILATION_H_FACTOR: VOffsetT = 16;

    pub fn padding(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_PADDING, Some(0)).unwrap_or(0) }
    }

    pub fn stride_w(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_W, Some(0)).unwrap_or(0) }
    }

    pub fn stride_h(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_H, Some(0)).unwrap_or(0) }
    }

    pub fn depth_multiplier(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_DEPTH_MULTIPLIER, Some(0)).unwrap_or(0) }
    }

    pub fn fused_activation_function(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_FUSED_ACTIVATION_FUNCTION, Some(0)).unwrap_or(0) }
    }

    pub fn dilation_w_factor(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_DILATION_W_FACTOR, Some(1)).unwrap_or(1) }
    }

    pub fn dilation_h_factor(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_DILATION_H_FACTOR, Some(1)).unwrap_or(1) }
    }
}

impl Verifiable for DepthwiseConv2DOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>("padding", Self::VT_PADDING, false)?
            .visit_field::<i32>("stride_w", Self::VT_STRIDE_W, false)?
            .visit_field::<i32>("stride_h", Self::VT_STRIDE_H, false)?
            .visit_field::<i32>("depth_multiplier", Self::VT_DEPTH_MULTIPLIER, false)?
            .visit_field::<i8>(
                "fused_activation_function",
                Self::VT_FUSED_ACTIVATION_FUNCTION,
                false,
            )?
            .visit_field::<i32>("dilation_w_factor", Self::VT_DILATION_W_FACTOR, false)?
            .visit_field::<i32>("dilation_h_factor", Self::VT_DILATION_H_FACTOR, false)?
            .finish();
        Ok(())
    }
}

schema_table!(Pool2DOptions);

impl<'a> Pool2DOptions<'a> {
    pub const VT_PADDING: VOffsetT = 4;
    pub const VT_STRIDE_W: VOffsetT = 6;
    pub const VT_STRIDE_H: VOffsetT = 8;
    pub const VT_FILTER_WIDTH: VOffsetT = 10;
    pub const VT_FILTER_HEIGHT: VOffsetT = 12;
    pub const VT_FUSED_ACTIVATION_FUNCTION: VOffsetT = 14;

    pub fn padding(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_PADDING, Some(0)).unwrap_or(0) }
    }

    pub fn stride_w(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_W, Some(0)).unwrap_or(0) }
    }

    pub fn stride_h(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_STRIDE_H, Some(0)).unwrap_or(0) }
    }

    pub fn filter_width(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_FILTER_WIDTH, Some(0)).unwrap_or(0) }
    }

    pub fn filter_height(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_FILTER_HEIGHT, Some(0)).unwrap_or(0) }
    }

    pub fn fused_activation_function(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_FUSED_ACTIVATION_FUNCTION, Some(0)).unwrap_or(0) }
    }
}

impl Verifiable for Pool2DOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>("padding", Self::VT_PADDING, false)?
            .visit_field::<i32>("stride_w", Self::VT_STRIDE_W, false)?
            .visit_field::<i32>("stride_h", Self::VT_STRIDE_H, false)?
            .visit_field::<i32>("filter_width", Self::VT_FILTER_WIDTH, false)?
            .visit_field::<i32>("filter_height", Self::VT_FILTER_HEIGHT, false)?
            .visit_field::<i8>(
                "fused_activation_function",
                Self::VT_FUSED_ACTIVATION_FUNCTION,
                false,
            )?
            .finish();
        Ok(())
    }
}

schema_table!(SoftmaxOptions);

impl<'a> SoftmaxOptions<'a> {
    pub const VT_BETA: VOffsetT = 4;

    pub fn beta(&self) -> f32 {
        unsafe { self._tab.get::<f32>(Self::VT_BETA, Some(0.0)).unwrap_or(0.0) }
    }
}

impl Verifiable for SoftmaxOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<f32>("beta", Self::VT_BETA, false)?
            .finish();
        Ok(())
    }
}

schema_table!(AddOptions);

impl<'a> AddOptions<'a> {
    pub const VT_FUSED_ACTIVATION_FUNCTION: VOffsetT = 4;
    pub const VT_POT_SCALE_INT16: VOffsetT = 6;

    pub fn fused_activation_function(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_FUSED_ACTIVATION_FUNCTION, Some(0)).unwrap_or(0) }
    }

    pub fn pot_scale_int16(&self) -> bool {
        unsafe { self._tab.get::<bool>(Self::VT_POT_SCALE_INT16, Some(true)).unwrap_or(true) }
    }
}

impl Verifiable for AddOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>(
                "fused_activation_function",
                Self::VT_FUSED_ACTIVATION_FUNCTION,
                false,
            )?
            .visit_field::<bool>("pot_scale_int16", Self::VT_POT_SCALE_INT16, false)?
            .finish();
        Ok(())
    }
}

schema_table!(SqueezeOptions);

impl<'a> SqueezeOptions<'a> {
    pub const VT_SQUEEZE_DIMS: VOffsetT = 4;

    pub fn squeeze_dims(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_SQUEEZE_DIMS, None)
        }
    }
}

impl Verifiable for SqueezeOptions<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>(
                "squeeze_dims",
                Self::VT_SQUEEZE_DIMS,
                false,
            )?
            .finish();
        Ok(())
    }
}
